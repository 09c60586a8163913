//! Reconnecting websocket transport.
//!
//! [`LinkTask`] is the only owner of the socket. It executes the actions of
//! the core [`Link`] state machine: connect, announce, send, force-close, and
//! the fixed-delay reconnect. Everything else talks to it through a cloneable
//! [`TransportHandle`] and receives [`TransportEvent`]s.
//!
//! Requests are never queued across a disconnect. A send while the link is
//! down fails with [`TransportError::NotConnected`], and anything still in
//! the outbound channel when the connection drops is discarded.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use camlink_core::{
    env::Environment,
    link::{Link, LinkAction, LinkConfig, LinkState},
    transport::Connector,
};
use camlink_proto::{Message, Request};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    WebSocketStream, client_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Events reported by the link task.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A connection opened and the announcement was sent.
    Connected,
    /// The connection closed or failed. A reconnect is scheduled.
    Disconnected,
    /// A decoded peer message.
    Message(Message),
}

/// Cloneable handle for sending requests.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<Request>,
    connected: Arc<AtomicBool>,
}

impl TransportHandle {
    /// Handle over an existing channel and connectivity flag.
    pub fn new(outbound: mpsc::UnboundedSender<Request>, connected: Arc<AtomicBool>) -> Self {
        Self { outbound, connected }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send a request to the peer.
    ///
    /// Fire-and-forget: success means the request was handed to the link
    /// task, not that the peer received it.
    pub fn send(&self, request: Request) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.outbound.send(request).map_err(|_| TransportError::Closed)
    }
}

/// Create a transport.
///
/// Returns the send handle, the event stream, and the task that must be
/// spawned to drive the connection.
pub fn transport<C: Connector, E: Environment>(
    connector: C,
    env: E,
    url: impl Into<String>,
    config: LinkConfig,
) -> (TransportHandle, mpsc::UnboundedReceiver<TransportEvent>, LinkTask<C, E>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let connected = Arc::new(AtomicBool::new(false));

    let task = LinkTask {
        connector,
        env,
        url: url.into(),
        link: Link::new(config),
        outbound: outbound_rx,
        events: events_tx,
        connected: Arc::clone(&connected),
    };
    (TransportHandle::new(outbound_tx, connected), events_rx, task)
}

/// Connection owner. Run with [`LinkTask::run`].
pub struct LinkTask<C: Connector, E: Environment> {
    connector: C,
    env: E,
    url: String,
    link: Link,
    outbound: mpsc::UnboundedReceiver<Request>,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

type Socket<C> = WebSocketStream<<C as Connector>::Stream>;

enum Wake {
    Incoming(Option<Result<WsMessage, WsError>>),
    Outbound(Option<Request>),
}

impl<C: Connector, E: Environment> LinkTask<C, E> {
    /// Drive the connection until the event receiver or every handle is
    /// dropped.
    pub async fn run(mut self) {
        let mut socket: Option<Socket<C>> = None;
        let mut pending: VecDeque<LinkAction> = match self.link.start() {
            Ok(actions) => actions.into(),
            Err(e) => {
                warn!(error = %e, "link already started");
                return;
            },
        };

        loop {
            while let Some(action) = pending.pop_front() {
                self.execute(action, &mut socket, &mut pending).await;
            }

            if self.events.is_closed() {
                debug!("event receiver dropped, link task exiting");
                break;
            }

            match self.link.state() {
                LinkState::Idle => break,
                LinkState::Connecting => match self.open().await {
                    Ok(ws) => {
                        info!(url = %self.url, "connected");
                        socket = Some(ws);
                        match self.link.opened() {
                            Ok(actions) => pending.extend(actions),
                            Err(e) => warn!(error = %e, "unexpected open"),
                        }
                    },
                    Err(e) => {
                        warn!(url = %self.url, error = %e, "connect failed");
                        pending.extend(self.link.closed(self.env.now()));
                    },
                },
                LinkState::Open => {
                    let Some(ws) = socket.as_mut() else {
                        pending.extend(self.link.errored(self.env.now()));
                        continue;
                    };
                    let wake = tokio::select! {
                        incoming = ws.next() => Wake::Incoming(incoming),
                        request = self.outbound.recv() => Wake::Outbound(request),
                    };
                    match wake {
                        Wake::Incoming(incoming) => self.receive(incoming, &mut socket, &mut pending),
                        Wake::Outbound(Some(request)) => match self.link.send(request) {
                            Some(action) => pending.push_back(action),
                            None => debug!("link not open, request dropped"),
                        },
                        Wake::Outbound(None) => {
                            debug!("all handles dropped, link task exiting");
                            if let Some(mut ws) = socket.take() {
                                let _ = ws.close(None).await;
                            }
                            break;
                        },
                    }
                },
                LinkState::Waiting => {
                    if let Some(at) = self.link.reconnect_at() {
                        let delay = at.saturating_duration_since(self.env.now());
                        debug!(?delay, "reconnect scheduled");
                        self.env.sleep(delay).await;
                    }
                    self.discard_outbound();
                    pending.extend(self.link.tick(self.env.now()));
                },
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }

    async fn open(&self) -> Result<Socket<C>, WsError> {
        let stream = self.connector.connect().await?;
        let (ws, _response) = client_async(self.url.as_str(), stream).await?;
        Ok(ws)
    }

    fn receive(
        &mut self,
        incoming: Option<Result<WsMessage, WsError>>,
        socket: &mut Option<Socket<C>>,
        pending: &mut VecDeque<LinkAction>,
    ) {
        match incoming {
            Some(Ok(message)) if message.is_text() => match message.to_text() {
                Ok(text) => match Message::parse(text) {
                    Ok(message) => {
                        let _ = self.events.send(TransportEvent::Message(message));
                    },
                    Err(e) => debug!(error = %e, "undecodable frame dropped"),
                },
                Err(e) => debug!(error = %e, "non utf-8 text frame dropped"),
            },
            Some(Ok(WsMessage::Close(frame))) => {
                info!(?frame, "connection closed by peer");
                socket.take();
                pending.extend(self.link.closed(self.env.now()));
            },
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                warn!(error = %e, "connection error");
                pending.extend(self.link.errored(self.env.now()));
            },
            None => {
                info!("connection closed");
                socket.take();
                pending.extend(self.link.closed(self.env.now()));
            },
        }
    }

    async fn execute(
        &mut self,
        action: LinkAction,
        socket: &mut Option<Socket<C>>,
        pending: &mut VecDeque<LinkAction>,
    ) {
        match action {
            LinkAction::Connect => debug!(url = %self.url, "connecting"),
            LinkAction::Send(request) => {
                let Some(ws) = socket.as_mut() else {
                    debug!("no socket, request dropped");
                    return;
                };
                let text = match request.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "request encode failed");
                        return;
                    },
                };
                if let Err(e) = ws.send(WsMessage::text(text)).await {
                    warn!(error = %e, "send failed");
                    pending.extend(self.link.errored(self.env.now()));
                }
            },
            LinkAction::ForceClose => {
                if let Some(mut ws) = socket.take() {
                    if let Err(e) = ws.close(None).await {
                        debug!(error = %e, "force close");
                    }
                }
            },
            LinkAction::Connectivity(connected) => {
                self.connected.store(connected, Ordering::SeqCst);
                let event = if connected {
                    TransportEvent::Connected
                } else {
                    self.discard_outbound();
                    TransportEvent::Disconnected
                };
                let _ = self.events.send(event);
            },
        }
    }

    fn discard_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "requests dropped while disconnected");
        }
    }
}
