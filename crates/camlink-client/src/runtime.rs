//! Orchestration runtime.
//!
//! Owns the device [`Registry`] and is the only place where core actions turn
//! into effects: requests go to the transport, view updates and change
//! notifications go to the [`ViewSink`]. Detection runs on a fixed cadence
//! derived from the [`DetectionConfig`].

use camlink_core::{
    DetectionConfig, DeviceAction, OperatorCommand, Registry, SessionAction, SessionError,
    ViewUpdate, env::Environment, handshake::CommandKind, router, snapshot::FieldGroup,
};
use camlink_proto::Request;
use tokio::{
    sync::mpsc,
    time::{Duration, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    error::TransportError,
    transport::{TransportEvent, TransportHandle},
};

/// Receiver of everything the operator should see.
pub trait ViewSink {
    /// The active device has something new to show.
    fn view(&mut self, device: &str, update: &ViewUpdate);

    /// Connectivity to the peer changed.
    fn connectivity(&mut self, connected: bool);

    /// A field group changed on some device, active or not.
    fn changed(&mut self, _device: &str, _group: FieldGroup) {}

    /// An operator command was refused.
    fn refused(&mut self, _command: &str, _error: &SessionError) {}
}

/// The console runtime.
pub struct Runtime<E: Environment, S: ViewSink> {
    env: E,
    registry: Registry,
    transport: TransportHandle,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    sink: S,
    period: Duration,
}

impl<E: Environment, S: ViewSink> Runtime<E, S> {
    /// Runtime over a transport created with [`crate::transport()`].
    pub fn new(
        env: E,
        config: DetectionConfig,
        transport: TransportHandle,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        sink: S,
    ) -> Self {
        let period = config.inputs_period.min(config.outputs_period).min(config.rearm_period);
        Self { env, registry: Registry::new(config), transport, events, sink, period }
    }

    /// Device registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// View sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Handle one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("peer connected");
                self.sink.connectivity(true);
            },
            TransportEvent::Disconnected => {
                warn!("peer disconnected");
                self.sink.connectivity(false);
            },
            TransportEvent::Message(message) => {
                let (outcome, actions) =
                    router::dispatch(&mut self.registry, message, self.env.now());
                debug!(?outcome, "dispatched");
                self.execute(actions);
            },
        }
    }

    /// Apply an operator command.
    pub fn command(&mut self, command: OperatorCommand) -> Result<(), SessionError> {
        let name = command.name();
        match self.registry.apply(command, self.env.now()) {
            Ok(actions) => {
                self.execute(actions);
                Ok(())
            },
            Err(e) => {
                warn!(command = name, error = %e, "command refused");
                self.sink.refused(name, &e);
                Err(e)
            },
        }
    }

    /// Run detection and re-arm polls.
    pub fn tick(&mut self) {
        let actions = self.registry.tick(self.env.now());
        self.execute(actions);
    }

    /// Run until the command channel or the transport closes. Returns the
    /// sink.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<OperatorCommand>) -> S {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("transport closed");
                        break;
                    },
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        let _ = self.command(command);
                    },
                    None => {
                        debug!("command channel closed");
                        break;
                    },
                },
                _ = ticker.tick() => self.tick(),
            }
        }
        self.sink
    }

    fn execute(&mut self, actions: Vec<DeviceAction>) {
        for DeviceAction { device, action } in actions {
            match action {
                SessionAction::Send(request) => {
                    let raised = match &request {
                        Request::Control { control, value: true, .. } => {
                            Some(CommandKind::from(*control))
                        },
                        _ => None,
                    };
                    match self.transport.send(request) {
                        Ok(()) => {},
                        Err(TransportError::NotConnected) => {
                            debug!(device, "not connected, request dropped");
                            let session = self.registry.session_mut(&device);
                            if let (Some(kind), Some(session)) = (raised, session) {
                                session.withdraw(kind);
                            }
                        },
                        Err(e) => warn!(device, error = %e, "send failed"),
                    }
                },
                SessionAction::Changed(group) => self.sink.changed(&device, group),
                SessionAction::View(update) => self.sink.view(&device, &update),
                SessionAction::ArmRearm | SessionAction::CancelRearm => {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use camlink_proto::{Control, Message, Request, SectionUpdate, StatusBits};

    use super::*;
    use crate::env::SystemEnv;

    #[derive(Default)]
    struct Recorder {
        views: Vec<(String, ViewUpdate)>,
        connectivity: Vec<bool>,
        refused: Vec<String>,
    }

    impl ViewSink for Recorder {
        fn view(&mut self, device: &str, update: &ViewUpdate) {
            self.views.push((device.to_string(), update.clone()));
        }

        fn connectivity(&mut self, connected: bool) {
            self.connectivity.push(connected);
        }

        fn refused(&mut self, command: &str, _error: &SessionError) {
            self.refused.push(command.to_string());
        }
    }

    struct Fixture {
        runtime: Runtime<SystemEnv, Recorder>,
        outbound: mpsc::UnboundedReceiver<Request>,
        events: mpsc::UnboundedSender<TransportEvent>,
        connected: Arc<AtomicBool>,
    }

    fn fixture() -> Fixture {
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let handle = TransportHandle::new(outbound_tx, Arc::clone(&connected));
        let runtime =
            Runtime::new(SystemEnv, DetectionConfig::default(), handle, events_rx, Recorder::default());
        Fixture { runtime, outbound, events, connected }
    }

    fn bootstrap(runtime: &mut Runtime<SystemEnv, Recorder>) {
        runtime.handle_event(TransportEvent::Message(Message::DeviceList(vec![
            "camA".into(),
            "camB".into(),
        ])));
    }

    fn status(device: &str, bits: StatusBits) -> TransportEvent {
        TransportEvent::Message(Message::Status {
            device: device.into(),
            update: SectionUpdate::Status(bits),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledge_clears_through_transport() {
        let mut f = fixture();
        bootstrap(&mut f.runtime);
        assert_eq!(f.runtime.registry().active(), Some("camA"));

        f.runtime.command(OperatorCommand::Trigger).unwrap();
        assert_eq!(
            f.outbound.try_recv().unwrap(),
            Request::Control { device: "camA".into(), control: Control::Trigger, value: true }
        );

        f.runtime.handle_event(status("camA", StatusBits { trigger_acknowledge: true, ..Default::default() }));
        tokio::time::advance(Duration::from_millis(10)).await;
        f.runtime.tick();

        assert_eq!(
            f.outbound.try_recv().unwrap(),
            Request::Control { device: "camA".into(), control: Control::Trigger, value: false }
        );
        assert!(f.outbound.try_recv().is_err());
        assert!(
            f.runtime
                .sink()
                .views
                .iter()
                .any(|(d, u)| d == "camA" && matches!(u, ViewUpdate::Status(s) if s.trigger_acknowledge))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn commands_dropped_while_disconnected() {
        let mut f = fixture();
        bootstrap(&mut f.runtime);
        f.connected.store(false, Ordering::SeqCst);
        f.runtime.handle_event(TransportEvent::Disconnected);

        f.runtime.command(OperatorCommand::Reset(true)).unwrap();
        assert!(f.outbound.try_recv().is_err());
        assert_eq!(f.runtime.sink().connectivity, vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_lost_while_disconnected_does_not_stay_pending() {
        let mut f = fixture();
        bootstrap(&mut f.runtime);
        f.connected.store(false, Ordering::SeqCst);
        f.runtime.handle_event(TransportEvent::Disconnected);

        f.runtime.command(OperatorCommand::Trigger).unwrap();
        assert!(f.outbound.try_recv().is_err());

        f.connected.store(true, Ordering::SeqCst);
        f.runtime.handle_event(TransportEvent::Connected);
        f.runtime.command(OperatorCommand::Trigger).unwrap();
        assert_eq!(
            f.outbound.try_recv().unwrap(),
            Request::Control { device: "camA".into(), control: Control::Trigger, value: true }
        );
        assert!(f.runtime.sink().refused.is_empty());

        // The device never answers: the operator clears by hand and retries.
        assert!(matches!(
            f.runtime.command(OperatorCommand::Trigger),
            Err(SessionError::CommandPending { .. })
        ));
        f.runtime.command(OperatorCommand::ClearTrigger).unwrap();
        assert_eq!(
            f.outbound.try_recv().unwrap(),
            Request::Control { device: "camA".into(), control: Control::Trigger, value: false }
        );
        f.runtime.command(OperatorCommand::Trigger).unwrap();
        assert_eq!(
            f.outbound.try_recv().unwrap(),
            Request::Control { device: "camA".into(), control: Control::Trigger, value: true }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refused_commands_reach_sink() {
        let mut f = fixture();
        assert_eq!(f.runtime.command(OperatorCommand::Trigger), Err(SessionError::NoActiveDevice));

        bootstrap(&mut f.runtime);
        f.runtime.command(OperatorCommand::Trigger).unwrap();
        assert!(f.runtime.command(OperatorCommand::Trigger).is_err());
        assert_eq!(f.runtime.sink().refused, vec!["trigger", "trigger"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_drives_detection_until_commands_close() {
        let f = fixture();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let events = f.events.clone();
        let mut outbound = f.outbound;

        let runtime = tokio::spawn(f.runtime.run(commands));

        events.send(TransportEvent::Connected).unwrap();
        events
            .send(TransportEvent::Message(Message::DeviceList(vec!["camA".into()])))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        commands_tx.send(OperatorCommand::ProgramChange(true)).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        events
            .send(status("camA", StatusBits { program_change_acknowledge: true, ..Default::default() }))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(commands_tx);
        let sink = runtime.await.unwrap();

        let mut sent = Vec::new();
        while let Ok(request) = outbound.try_recv() {
            sent.push(request);
        }
        assert_eq!(
            sent,
            vec![
                Request::Control { device: "camA".into(), control: Control::ProgramChange, value: true },
                Request::Control { device: "camA".into(), control: Control::ProgramChange, value: false },
            ]
        );
        assert_eq!(sink.connectivity, vec![true]);
    }
}
