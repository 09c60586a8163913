//! Reconnecting link state machine.
//!
//! This module implements the connection envelope around the websocket:
//! opening, announcing, and unconditional timed reconnects.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as parameter (no stored Environment)
//! - Methods return actions for the driver to execute
//! - The driver owns the socket and reports open/close/error back
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  start   ┌────────────┐   opened    ┌──────┐
//! │ Idle │─────────>│ Connecting │────────────>│ Open │
//! └──────┘          └────────────┘             └──────┘
//!                        │ ↑                       │
//!          failed/error  │ │ delay elapsed         │ closed/error
//!                        ↓ │                       ↓
//!                   ┌─────────┐                    │
//!                   │ Waiting │<───────────────────┘
//!                   └─────────┘
//! ```
//!
//! The reconnect delay is fixed. There is no backoff growth and no give-up.
//! Requests are never queued across a disconnect: anything the driver was
//! asked to send while not Open is dropped.

use std::time::{Duration, Instant};

use camlink_proto::Request;

use crate::error::LinkError;

/// Actions returned by the link state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkAction {
    /// Open a new connection, replacing any previous one.
    Connect,
    /// Send this request on the open connection.
    Send(Request),
    /// Force-close the current socket.
    ForceClose,
    /// Connectivity flag changed.
    Connectivity(bool),
}

/// Link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not started.
    Idle,
    /// Connect in progress.
    Connecting,
    /// Connection open and announced.
    Open,
    /// Waiting for the reconnect delay to elapse.
    Waiting,
}

/// Link configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Delay between a close or error and the next connect attempt.
    pub reconnect_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { reconnect_delay: Duration::from_millis(2000) }
    }
}

/// Link state machine.
#[derive(Debug, Clone)]
pub struct Link {
    state: LinkState,
    config: LinkConfig,
    reconnect_at: Option<Instant>,
    connections: u64,
}

impl Link {
    /// Create a link in Idle state.
    pub fn new(config: LinkConfig) -> Self {
        Self { state: LinkState::Idle, config, reconnect_at: None, connections: 0 }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether requests can currently be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Open
    }

    /// Number of connections opened so far.
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Instant of the next scheduled connect attempt, while Waiting.
    #[must_use]
    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Begin the first connection.
    ///
    /// # Errors
    /// Returns `InvalidState` if the link was already started.
    pub fn start(&mut self) -> Result<Vec<LinkAction>, LinkError> {
        if self.state != LinkState::Idle {
            return Err(LinkError::InvalidState { state: self.state, operation: "start" });
        }
        self.state = LinkState::Connecting;
        Ok(vec![LinkAction::Connect])
    }

    /// The connection opened.
    ///
    /// Marks the link connected and announces the console to the peer.
    ///
    /// # Errors
    /// Returns `InvalidState` unless a connect was in progress.
    pub fn opened(&mut self) -> Result<Vec<LinkAction>, LinkError> {
        if self.state != LinkState::Connecting {
            return Err(LinkError::InvalidState { state: self.state, operation: "opened" });
        }
        self.state = LinkState::Open;
        self.connections += 1;
        Ok(vec![LinkAction::Connectivity(true), LinkAction::Send(Request::Announce)])
    }

    /// The connection closed, or a connect attempt failed.
    ///
    /// Schedules a reconnect after the fixed delay. A close reported while
    /// already Waiting (the close that follows a forced close) is absorbed so
    /// that exactly one reconnect is pending.
    pub fn closed(&mut self, now: Instant) -> Vec<LinkAction> {
        match self.state {
            LinkState::Open => {
                self.schedule(now);
                vec![LinkAction::Connectivity(false)]
            },
            LinkState::Connecting => {
                self.schedule(now);
                vec![]
            },
            LinkState::Idle | LinkState::Waiting => vec![],
        }
    }

    /// The connection reported an error.
    ///
    /// Same recovery as [`Link::closed`], after force-closing the socket.
    pub fn errored(&mut self, now: Instant) -> Vec<LinkAction> {
        match self.state {
            LinkState::Open | LinkState::Connecting => {
                let mut actions = vec![LinkAction::ForceClose];
                actions.extend(self.closed(now));
                actions
            },
            LinkState::Idle | LinkState::Waiting => vec![],
        }
    }

    /// Route an outbound request through the link.
    ///
    /// Returns the send action while Open, otherwise drops the request.
    pub fn send(&self, request: Request) -> Option<LinkAction> {
        self.is_connected().then_some(LinkAction::Send(request))
    }

    /// Tick the state machine. Starts the reconnect once the delay elapsed.
    pub fn tick(&mut self, now: Instant) -> Vec<LinkAction> {
        match (self.state, self.reconnect_at) {
            (LinkState::Waiting, Some(at)) if now >= at => {
                self.state = LinkState::Connecting;
                self.reconnect_at = None;
                vec![LinkAction::Connect]
            },
            _ => vec![],
        }
    }

    fn schedule(&mut self, now: Instant) {
        self.state = LinkState::Waiting;
        self.reconnect_at = Some(now + self.config.reconnect_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_lifecycle() {
        let t0 = Instant::now();
        let mut link = Link::new(LinkConfig::default());
        assert_eq!(link.state(), LinkState::Idle);

        assert_eq!(link.start().unwrap(), vec![LinkAction::Connect]);
        assert_eq!(link.state(), LinkState::Connecting);
        assert!(!link.is_connected());

        let actions = link.opened().unwrap();
        assert_eq!(
            actions,
            vec![LinkAction::Connectivity(true), LinkAction::Send(Request::Announce)]
        );
        assert!(link.is_connected());
        assert_eq!(link.connections(), 1);

        let actions = link.closed(t0);
        assert_eq!(actions, vec![LinkAction::Connectivity(false)]);
        assert_eq!(link.state(), LinkState::Waiting);
        assert_eq!(link.reconnect_at(), Some(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn reconnect_waits_fixed_delay() {
        let t0 = Instant::now();
        let mut link = Link::new(LinkConfig::default());
        link.start().unwrap();
        link.opened().unwrap();
        link.closed(t0);

        assert!(link.tick(t0 + Duration::from_millis(1999)).is_empty());
        assert_eq!(link.tick(t0 + Duration::from_millis(2000)), vec![LinkAction::Connect]);
        assert_eq!(link.state(), LinkState::Connecting);

        // Failed attempt waits the same delay again.
        let t1 = t0 + Duration::from_millis(2100);
        assert!(link.closed(t1).is_empty());
        assert_eq!(link.reconnect_at(), Some(t1 + Duration::from_millis(2000)));
    }

    #[test]
    fn error_force_closes_once() {
        let t0 = Instant::now();
        let mut link = Link::new(LinkConfig::default());
        link.start().unwrap();
        link.opened().unwrap();

        let actions = link.errored(t0);
        assert_eq!(actions, vec![LinkAction::ForceClose, LinkAction::Connectivity(false)]);

        // The close that follows the forced close does not schedule again.
        let later = t0 + Duration::from_millis(10);
        assert!(link.closed(later).is_empty());
        assert_eq!(link.reconnect_at(), Some(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn sends_dropped_while_not_open() {
        let t0 = Instant::now();
        let mut link = Link::new(LinkConfig::default());
        assert!(link.send(Request::Announce).is_none());

        link.start().unwrap();
        link.opened().unwrap();
        assert!(link.send(Request::Announce).is_some());

        link.closed(t0);
        assert!(link.send(Request::Announce).is_none());
    }

    #[test]
    fn invalid_state_transitions() {
        let mut link = Link::new(LinkConfig::default());
        assert!(matches!(link.opened(), Err(LinkError::InvalidState { .. })));

        link.start().unwrap();
        assert!(matches!(link.start(), Err(LinkError::InvalidState { .. })));
    }
}
