//! Device state session.
//!
//! One session per device. It holds the mirrored [`Inputs`] and [`Outputs`]
//! snapshots, their previous-observed shadows, and drives the command
//! handshakes.
//!
//! # Architecture: Action-Based State Machine
//!
//! - The router writes peer snapshots with [`DeviceSession::apply`]
//! - [`DeviceSession::tick`] runs change detection when a period elapsed
//! - Operator setters validate and return the request to send
//! - Every effect comes back as a [`SessionAction`] for the driver
//!
//! # Active vs inactive
//!
//! Every session runs change detection and the handshake reactions. Only the
//! active session emits [`SessionAction::View`] updates, and only the active
//! session accepts operator commands. A clearing request caused by an
//! acknowledge edge is part of the handshake and is sent even for an inactive
//! session, otherwise its latch would stay raised forever.
//!
//! # Ordering
//!
//! Input and output detection run on independent periods. One peer update
//! that touches several sections may therefore surface as several separate
//! change notifications over nearby ticks.

use std::{
    cmp::Ordering,
    time::{Duration, Instant},
};

use camlink_proto::{
    DeviceId, RegisterValue, Request, SectionUpdate, StatisticsField, StatusBits,
};
use tracing::{debug, warn};

use crate::{
    detector::{Detection, InputShadows, OutputShadows},
    error::SessionError,
    handshake::{self, CommandKind, HandshakeEvent, LatchState, Outcome},
    snapshot::{FieldGroup, Inputs, Outputs, RenderField, render_fields},
};

/// Actions returned by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send this request to the peer.
    Send(Request),
    /// A field group changed. Emitted whether or not the session is active.
    Changed(FieldGroup),
    /// Refresh a view element. Only emitted by the active session.
    View(ViewUpdate),
    /// Start the continuous trigger re-arm poll for this device.
    ArmRearm,
    /// Stop the re-arm poll for this device.
    CancelRearm,
}

/// View refresh hooks, carrying the data to display.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// A new result image is available.
    Image,
    /// Input register fields (schema or values changed).
    InputFields(Vec<RenderField>),
    /// Status bits.
    Status(StatusBits),
    /// One statistics value, in seconds.
    Statistic {
        /// Which value.
        field: StatisticsField,
        /// New value.
        seconds: f64,
    },
    /// Acknowledged program number.
    ProgramNumber(Option<i64>),
    /// Output register fields (schema or values changed).
    OutputFields(Vec<RenderField>),
}

/// Detection cadence.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Period of the input detection pass.
    pub inputs_period: Duration,
    /// Period of the output detection pass.
    pub outputs_period: Duration,
    /// Period of the continuous trigger re-arm poll.
    pub rearm_period: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            inputs_period: Duration::from_millis(10),
            outputs_period: Duration::from_millis(10),
            rearm_period: Duration::from_millis(10),
        }
    }
}

/// State synchronization session for one device.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    device: DeviceId,
    active: bool,
    inputs: Inputs,
    outputs: Outputs,
    input_shadows: InputShadows,
    output_shadows: OutputShadows,
    config: DetectionConfig,
    next_inputs_check: Instant,
    next_outputs_check: Instant,
}

impl DeviceSession {
    /// Create an inactive session with empty snapshots.
    pub fn new(device: impl Into<DeviceId>, config: DetectionConfig, now: Instant) -> Self {
        let inputs = Inputs::default();
        let outputs = Outputs::default();
        Self {
            device: device.into(),
            active: false,
            input_shadows: InputShadows::from_inputs(&inputs),
            output_shadows: OutputShadows::from_outputs(&outputs),
            inputs,
            outputs,
            next_inputs_check: now + config.inputs_period,
            next_outputs_check: now + config.outputs_period,
            config,
        }
    }

    /// Device identifier.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Whether this is the active session.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mirrored inputs.
    #[must_use]
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    /// Mirrored outputs.
    #[must_use]
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Handshake state of a command latch.
    #[must_use]
    pub fn latch(&self, kind: CommandKind) -> LatchState {
        LatchState::from_latch(match kind {
            CommandKind::Trigger => self.inputs.trigger,
            CommandKind::ProgramChange => self.inputs.program_change,
            CommandKind::Reset => self.inputs.reset,
        })
    }

    /// Store a snapshot pushed by the peer.
    ///
    /// Only the snapshot is replaced here. Reactions happen on the next
    /// detection pass.
    pub fn apply(&mut self, update: SectionUpdate) {
        match update {
            SectionUpdate::InputsRegister(values) => self.inputs.inputs_register = values,
            SectionUpdate::InputsVariables(schema) => self.inputs.inputs_variables = schema,
            SectionUpdate::Status(bits) => self.outputs.status = bits,
            SectionUpdate::Statistics(statistics) => self.outputs.statistics = statistics,
            SectionUpdate::ProgramNumberAcknowledge(number) => {
                self.outputs.program_number_acknowledge = number;
            },
            SectionUpdate::OutputsBoolRegister(values) => self.outputs.outputs_bool_register = values,
            SectionUpdate::OutputsRegister(values) => self.outputs.outputs_register = values,
            SectionUpdate::OutputsVariables(schema) => self.outputs.outputs_variables = schema,
        }
    }

    /// Activate or deactivate the session.
    ///
    /// Activation returns a full view refresh.
    pub fn set_active(&mut self, active: bool) -> Vec<SessionAction> {
        self.active = active;
        if !active {
            return Vec::new();
        }

        let statistics = self.outputs.statistics;
        let mut actions = vec![
            SessionAction::View(ViewUpdate::Image),
            SessionAction::View(ViewUpdate::InputFields(self.input_fields())),
            SessionAction::View(ViewUpdate::Status(self.outputs.status)),
        ];
        actions.extend(StatisticsField::ALL.into_iter().map(|field| {
            SessionAction::View(ViewUpdate::Statistic { field, seconds: statistics.get(field) })
        }));
        actions.push(SessionAction::View(ViewUpdate::OutputFields(self.output_fields())));
        actions.push(SessionAction::View(ViewUpdate::ProgramNumber(
            self.outputs.program_number_acknowledge,
        )));
        actions
    }

    /// Raise or clear the trigger latch.
    ///
    /// # Errors
    /// `Inactive` if the session is not active. `CommandPending` if a trigger
    /// is already requested or the device still reports its acknowledge bit.
    pub fn set_trigger(&mut self, state: bool) -> Result<Vec<SessionAction>, SessionError> {
        self.ensure_active()?;
        self.command(CommandKind::Trigger, state)
    }

    /// Enable or disable automatic re-triggering after each new image.
    ///
    /// Enabling also requests a trigger right away, if the guard allows it.
    /// Disabling cancels a running re-arm poll.
    ///
    /// # Errors
    /// `Inactive` if the session is not active.
    pub fn set_continuous_trigger(
        &mut self,
        state: bool,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.ensure_active()?;

        let mut actions = Vec::new();
        if state {
            match self.command(CommandKind::Trigger, true) {
                Ok(sent) => actions.extend(sent),
                Err(e) => debug!(device = %self.device, error = %e, "continuous mode on, trigger deferred"),
            }
        } else {
            actions.push(SessionAction::CancelRearm);
        }
        self.inputs.continuous_trigger = state;
        Ok(actions)
    }

    /// Raise or clear the program change latch. Always sends.
    ///
    /// # Errors
    /// `Inactive` if the session is not active.
    pub fn set_program_change(&mut self, state: bool) -> Result<Vec<SessionAction>, SessionError> {
        self.ensure_active()?;
        self.command(CommandKind::ProgramChange, state)
    }

    /// Raise or clear the reset latch. Always sends.
    ///
    /// Reset has no feedback bits, so the caller clears it.
    ///
    /// # Errors
    /// `Inactive` if the session is not active.
    pub fn set_reset(&mut self, state: bool) -> Result<Vec<SessionAction>, SessionError> {
        self.ensure_active()?;
        self.command(CommandKind::Reset, state)
    }

    /// Select the program for the next program change.
    ///
    /// # Errors
    /// `Inactive` if the session is not active.
    pub fn set_program_number(&mut self, number: i64) -> Result<Vec<SessionAction>, SessionError> {
        self.ensure_active()?;
        self.inputs.program_number = Some(number);
        Ok(vec![SessionAction::Send(Request::ProgramNumber { device: self.device.clone(), number })])
    }

    /// Write one input register slot.
    ///
    /// Sent immediately, no handshake. The local register is updated
    /// optimistically when `index` is an existing slot or the next one. A
    /// write further out is only sent; the local copy catches up from the
    /// device's echo.
    ///
    /// # Errors
    /// `Inactive` if the session is not active.
    pub fn set_input_register(
        &mut self,
        index: usize,
        value_type: &str,
        value: RegisterValue,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.ensure_active()?;

        let registers = &mut self.inputs.inputs_register;
        match index.cmp(&registers.len()) {
            Ordering::Less => registers[index] = value.clone(),
            Ordering::Equal => registers.push(value.clone()),
            Ordering::Greater => {
                let len = registers.len();
                debug!(device = %self.device, index, len, "register write past local copy, not mirrored");
            },
        }

        Ok(vec![SessionAction::Send(Request::InputRegister {
            device: self.device.clone(),
            index,
            value_type: value_type.to_string(),
            value,
        })])
    }

    /// Run whichever detection passes are due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if now >= self.next_inputs_check {
            self.next_inputs_check = now + self.config.inputs_period;
            actions.extend(self.detect_inputs());
        }
        if now >= self.next_outputs_check {
            self.next_outputs_check = now + self.config.outputs_period;
            actions.extend(self.detect_outputs());
        }
        actions
    }

    /// Input detection pass.
    pub fn detect_inputs(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        for detection in self.input_shadows.detect(&self.inputs) {
            actions.push(SessionAction::Changed(detection.group()));
            if self.active {
                actions.push(SessionAction::View(ViewUpdate::InputFields(self.input_fields())));
            }
        }
        actions
    }

    /// Output detection pass, including the handshake reactions.
    pub fn detect_outputs(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        for detection in self.output_shadows.detect(&self.outputs) {
            actions.push(SessionAction::Changed(detection.group()));
            match detection {
                Detection::Status { previous } => self.react_to_status(previous, &mut actions),
                Detection::Statistics { previous } if self.active => {
                    let current = self.outputs.statistics;
                    actions.extend(current.changed_fields(&previous).into_iter().map(|field| {
                        SessionAction::View(ViewUpdate::Statistic {
                            field,
                            seconds: current.get(field),
                        })
                    }));
                },
                Detection::ProgramNumberAcknowledge if self.active => {
                    actions.push(SessionAction::View(ViewUpdate::ProgramNumber(
                        self.outputs.program_number_acknowledge,
                    )));
                },
                Detection::OutputRegisters | Detection::OutputVariables if self.active => {
                    actions.push(SessionAction::View(ViewUpdate::OutputFields(self.output_fields())));
                },
                _ => {},
            }
        }
        actions
    }

    /// Lower a latch whose request never reached the device.
    ///
    /// Nothing is sent. The next request for `kind` goes out as if the
    /// lost one had never been made.
    pub fn withdraw(&mut self, kind: CommandKind) {
        if self.latch(kind).is_requested() {
            debug!(device = %self.device, %kind, "request lost, latch withdrawn");
            *self.latch_mut(kind) = false;
        }
    }

    /// Re-arm poll check. Called each time the poll for this device is due.
    ///
    /// Returns nothing while the device is not ready. Once ready, requests
    /// one trigger and cancels the poll.
    pub fn poll_rearm(&mut self) -> Vec<SessionAction> {
        if !self.outputs.status.ready {
            return Vec::new();
        }

        let mut actions = match self.set_trigger(true) {
            Ok(actions) => actions,
            Err(e) => {
                debug!(device = %self.device, error = %e, "re-arm trigger refused");
                Vec::new()
            },
        };
        actions.push(SessionAction::CancelRearm);
        actions
    }

    fn react_to_status(&mut self, previous: StatusBits, actions: &mut Vec<SessionAction>) {
        let current = self.outputs.status;

        if self.active {
            actions.push(SessionAction::View(ViewUpdate::Status(current)));

            if handshake::rising(previous.new_image, current.new_image) {
                actions.push(SessionAction::View(ViewUpdate::Image));
                if self.inputs.continuous_trigger {
                    actions.push(SessionAction::ArmRearm);
                }
            }
        }

        for kind in [CommandKind::Trigger, CommandKind::ProgramChange] {
            let feedback = kind.feedback(&previous, &current);
            if feedback.acknowledged && feedback.errored {
                warn!(device = %self.device, %kind, "acknowledge and error rose together");
            }
            if feedback.any() {
                let (_, sent) = self.step(kind, HandshakeEvent::Feedback);
                actions.extend(sent);
            }
        }
    }

    fn command(
        &mut self,
        kind: CommandKind,
        state: bool,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let event = if state {
            let acknowledge_high = match kind {
                CommandKind::Trigger => self.outputs.status.trigger_acknowledge,
                CommandKind::ProgramChange => self.outputs.status.program_change_acknowledge,
                CommandKind::Reset => false,
            };
            HandshakeEvent::Request { acknowledge_high }
        } else {
            HandshakeEvent::Clear
        };

        match self.step(kind, event) {
            (Outcome::Refused, _) => Err(SessionError::CommandPending { kind }),
            (_, actions) => Ok(actions),
        }
    }

    fn step(&mut self, kind: CommandKind, event: HandshakeEvent) -> (Outcome, Vec<SessionAction>) {
        let before = self.latch(kind);
        let (after, outcome) = handshake::transition(kind, before, event);
        *self.latch_mut(kind) = after.is_requested();

        let actions = match outcome {
            Outcome::Send(value) => {
                debug!(device = %self.device, %kind, ?before, ?after, value, "handshake transition");
                vec![SessionAction::Send(Request::Control {
                    device: self.device.clone(),
                    control: kind.control(),
                    value,
                })]
            },
            Outcome::Refused | Outcome::Unchanged => Vec::new(),
        };
        (outcome, actions)
    }

    fn latch_mut(&mut self, kind: CommandKind) -> &mut bool {
        match kind {
            CommandKind::Trigger => &mut self.inputs.trigger,
            CommandKind::ProgramChange => &mut self.inputs.program_change,
            CommandKind::Reset => &mut self.inputs.reset,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.active {
            Ok(())
        } else {
            Err(SessionError::Inactive { device: self.device.clone() })
        }
    }

    fn input_fields(&self) -> Vec<RenderField> {
        render_fields(&self.inputs.inputs_variables, &self.inputs.inputs_register)
    }

    fn output_fields(&self) -> Vec<RenderField> {
        render_fields(&self.outputs.outputs_variables, &self.outputs.outputs_register)
    }
}

#[cfg(test)]
mod tests {
    use camlink_proto::{Control, Statistics, Variable};

    use super::*;

    fn active_session() -> DeviceSession {
        let mut session = DeviceSession::new("camA", DetectionConfig::default(), Instant::now());
        session.set_active(true);
        session
    }

    fn sent(actions: &[SessionAction]) -> Vec<&Request> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Send(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn control(value: bool, control: Control) -> Request {
        Request::Control { device: "camA".into(), control, value }
    }

    fn push_status(session: &mut DeviceSession, bits: StatusBits) -> Vec<SessionAction> {
        session.apply(SectionUpdate::Status(bits));
        session.detect_outputs()
    }

    #[test]
    fn trigger_request_sets_latch() {
        let mut session = active_session();
        let actions = session.set_trigger(true).unwrap();
        assert_eq!(sent(&actions), vec![&control(true, Control::Trigger)]);
        assert!(session.inputs().trigger);
        assert_eq!(session.latch(CommandKind::Trigger), LatchState::Requested);
    }

    #[test]
    fn trigger_guard_refuses_while_requested() {
        let mut session = active_session();
        session.set_trigger(true).unwrap();
        let result = session.set_trigger(true);
        assert_eq!(result, Err(SessionError::CommandPending { kind: CommandKind::Trigger }));
    }

    #[test]
    fn trigger_guard_refuses_while_acknowledge_high() {
        let mut session = active_session();
        session.apply(SectionUpdate::Status(StatusBits {
            trigger_acknowledge: true,
            ..Default::default()
        }));
        assert!(session.set_trigger(true).is_err());
        assert!(!session.inputs().trigger);
    }

    #[test]
    fn acknowledge_edge_clears_latch() {
        let mut session = active_session();
        session.set_trigger(true).unwrap();

        let actions =
            push_status(&mut session, StatusBits { trigger_acknowledge: true, ..Default::default() });

        assert_eq!(sent(&actions), vec![&control(false, Control::Trigger)]);
        assert!(!session.inputs().trigger);
    }

    #[test]
    fn error_edge_clears_program_change() {
        let mut session = active_session();
        session.set_program_change(true).unwrap();

        let actions = push_status(
            &mut session,
            StatusBits { program_change_error: true, ..Default::default() },
        );

        assert_eq!(sent(&actions), vec![&control(false, Control::ProgramChange)]);
        assert!(!session.inputs().program_change);
    }

    #[test]
    fn both_edges_clear_once() {
        let mut session = active_session();
        session.set_trigger(true).unwrap();

        let actions = push_status(
            &mut session,
            StatusBits { trigger_acknowledge: true, trigger_error: true, ..Default::default() },
        );
        assert_eq!(sent(&actions).len(), 1);
    }

    #[test]
    fn inactive_session_refuses_commands() {
        let mut session = DeviceSession::new("camA", DetectionConfig::default(), Instant::now());
        assert_eq!(
            session.set_reset(true),
            Err(SessionError::Inactive { device: "camA".into() })
        );
        assert!(session.set_program_number(3).is_err());
        assert!(!session.inputs().reset);
        assert_eq!(session.inputs().program_number, None);
    }

    #[test]
    fn inactive_session_still_clears_on_acknowledge() {
        let mut session = active_session();
        session.set_trigger(true).unwrap();
        session.set_active(false);

        let actions =
            push_status(&mut session, StatusBits { trigger_acknowledge: true, ..Default::default() });

        assert_eq!(sent(&actions), vec![&control(false, Control::Trigger)]);
        assert!(actions.iter().all(|a| !matches!(a, SessionAction::View(_))));
        assert!(actions.contains(&SessionAction::Changed(FieldGroup::Status)));
    }

    #[test]
    fn program_change_resends_every_call() {
        let mut session = active_session();
        assert_eq!(sent(&session.set_program_change(true).unwrap()).len(), 1);
        assert_eq!(sent(&session.set_program_change(true).unwrap()).len(), 1);
        assert_eq!(sent(&session.set_reset(false).unwrap()), vec![&control(false, Control::Reset)]);
    }

    #[test]
    fn register_write_appends_next_slot() {
        let mut session = active_session();
        session.set_input_register(0, "int", RegisterValue::Int(1)).unwrap();
        let actions = session.set_input_register(1, "int", RegisterValue::Int(9)).unwrap();
        assert_eq!(sent(&actions).len(), 1);
        session.set_input_register(0, "int", RegisterValue::Int(4)).unwrap();
        assert_eq!(
            session.inputs().inputs_register,
            vec![RegisterValue::Int(4), RegisterValue::Int(9)]
        );
    }

    #[test]
    fn far_register_write_sent_but_not_mirrored() {
        let mut session = active_session();
        session.set_input_register(0, "int", RegisterValue::Int(1)).unwrap();

        for index in [2, 4_000_000_000, usize::MAX] {
            let actions = session.set_input_register(index, "int", RegisterValue::Int(7)).unwrap();
            assert_eq!(
                sent(&actions),
                vec![&Request::InputRegister {
                    device: "camA".into(),
                    index,
                    value_type: "int".into(),
                    value: RegisterValue::Int(7),
                }]
            );
        }
        assert_eq!(session.inputs().inputs_register, vec![RegisterValue::Int(1)]);
    }

    #[test]
    fn withdrawn_trigger_can_be_requested_again() {
        let mut session = active_session();
        session.set_trigger(true).unwrap();
        assert!(matches!(session.set_trigger(true), Err(SessionError::CommandPending { .. })));

        session.withdraw(CommandKind::Trigger);
        assert_eq!(session.latch(CommandKind::Trigger), LatchState::Idle);
        assert_eq!(sent(&session.set_trigger(true).unwrap()), vec![&control(true, Control::Trigger)]);

        session.withdraw(CommandKind::Reset);
        assert_eq!(session.latch(CommandKind::Trigger), LatchState::Requested);
    }

    #[test]
    fn disabling_continuous_always_cancels_poll() {
        let mut session = active_session();
        session.set_continuous_trigger(true).unwrap();
        let actions = session.set_continuous_trigger(false).unwrap();
        assert_eq!(actions, vec![SessionAction::CancelRearm]);
        assert!(!session.inputs().continuous_trigger);
    }

    #[test]
    fn statistics_view_lists_changed_fields_only() {
        let mut session = active_session();
        session.apply(SectionUpdate::Statistics(Statistics { run_time: 0.02, ..Default::default() }));
        let actions = session.detect_outputs();
        assert_eq!(
            actions,
            vec![
                SessionAction::Changed(FieldGroup::Statistics),
                SessionAction::View(ViewUpdate::Statistic {
                    field: StatisticsField::RunTime,
                    seconds: 0.02
                }),
            ]
        );
    }

    #[test]
    fn input_schema_change_renders_fields() {
        let mut session = active_session();
        session.apply(SectionUpdate::InputsVariables(vec![Some(Variable::new("gain", "float"))]));
        session.apply(SectionUpdate::InputsRegister(vec![RegisterValue::Float(1.5)]));

        let actions = session.detect_inputs();
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0], SessionAction::Changed(FieldGroup::InputRegisters));
        assert_eq!(actions[2], SessionAction::Changed(FieldGroup::InputVariables));
        assert!(session.detect_inputs().is_empty());
    }

    #[test]
    fn tick_respects_periods() {
        let t0 = Instant::now();
        let mut session = DeviceSession::new("camA", DetectionConfig::default(), t0);
        session.apply(SectionUpdate::ProgramNumberAcknowledge(Some(4)));

        assert!(session.tick(t0 + Duration::from_millis(5)).is_empty());
        assert_eq!(
            session.tick(t0 + Duration::from_millis(10)),
            vec![SessionAction::Changed(FieldGroup::ProgramNumberAcknowledge)]
        );
    }

    #[test]
    fn activation_refreshes_every_view() {
        let mut session = DeviceSession::new("camA", DetectionConfig::default(), Instant::now());
        let actions = session.set_active(true);
        assert_eq!(actions.len(), 8);
        assert!(actions.iter().all(|a| matches!(a, SessionAction::View(_))));
        assert_eq!(actions[0], SessionAction::View(ViewUpdate::Image));
        assert!(session.set_active(false).is_empty());
    }
}
