//! Device registry.
//!
//! Owns every [`DeviceSession`] and the reference to the active one. Sessions
//! are created the first time the peer lists a device and live as long as the
//! registry. At most one session is active at a time.
//!
//! The registry also owns the continuous trigger re-arm polls. Sessions ask
//! for a poll with [`SessionAction::ArmRearm`] and drop it with
//! [`SessionAction::CancelRearm`]; those two actions are absorbed here and
//! never reach the driver.

use std::{collections::HashMap, time::Instant};

use camlink_proto::DeviceId;
use tracing::{debug, info};

use crate::{
    command::OperatorCommand,
    error::SessionError,
    rearm::RearmScheduler,
    session::{DetectionConfig, DeviceSession, SessionAction},
};

/// A session action tagged with the device it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAction {
    /// Device the action belongs to.
    pub device: DeviceId,
    /// The action.
    pub action: SessionAction,
}

/// All device sessions.
#[derive(Debug, Clone)]
pub struct Registry {
    sessions: HashMap<DeviceId, DeviceSession>,
    order: Vec<DeviceId>,
    active: Option<DeviceId>,
    rearm: RearmScheduler,
    config: DetectionConfig,
}

impl Registry {
    /// Empty registry.
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            active: None,
            rearm: RearmScheduler::new(config.rearm_period),
            config,
        }
    }

    /// Register a device. Returns `false` if it was already known.
    pub fn register(&mut self, device: &str, now: Instant) -> bool {
        if self.sessions.contains_key(device) {
            return false;
        }
        self.sessions
            .insert(device.to_string(), DeviceSession::new(device, self.config.clone(), now));
        self.order.push(device.to_string());
        true
    }

    /// Handle a device list from the peer.
    ///
    /// Unknown devices get a new session. If no session is active yet, the
    /// first listed device is activated. Returns the newly created devices
    /// and the activation refresh, if any.
    pub fn bootstrap(
        &mut self,
        devices: &[DeviceId],
        now: Instant,
    ) -> (Vec<DeviceId>, Vec<DeviceAction>) {
        let created: Vec<DeviceId> =
            devices.iter().filter(|device| self.register(device, now)).cloned().collect();

        let mut actions = Vec::new();
        if self.active.is_none() {
            if let Some(first) = devices.first() {
                actions = self.select(first);
            }
        }
        (created, actions)
    }

    /// Make `device` the active session.
    ///
    /// Every session is deactivated first. If `device` is unknown, no
    /// session stays active.
    pub fn select(&mut self, device: &str) -> Vec<DeviceAction> {
        for session in self.sessions.values_mut() {
            session.set_active(false);
        }

        let Some(session) = self.sessions.get_mut(device) else {
            debug!(device, "selected unknown device, no session active");
            self.active = None;
            return Vec::new();
        };

        info!(device, "device selected");
        self.active = Some(device.to_string());
        tag(device, session.set_active(true))
    }

    /// Active device, if any.
    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Session for `device`.
    #[must_use]
    pub fn session(&self, device: &str) -> Option<&DeviceSession> {
        self.sessions.get(device)
    }

    /// Mutable session for `device`.
    pub fn session_mut(&mut self, device: &str) -> Option<&mut DeviceSession> {
        self.sessions.get_mut(device)
    }

    /// Known devices in registration order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceId] {
        &self.order
    }

    /// Whether a re-arm poll is running for `device`.
    #[must_use]
    pub fn is_rearm_armed(&self, device: &str) -> bool {
        self.rearm.is_armed(device)
    }

    /// Apply an operator command.
    ///
    /// # Errors
    /// `NoActiveDevice` if no session is active, `UnknownDevice` for a
    /// selection of an unregistered device, or the session's refusal.
    pub fn apply(
        &mut self,
        command: OperatorCommand,
        now: Instant,
    ) -> Result<Vec<DeviceAction>, SessionError> {
        if let OperatorCommand::Select(device) = &command {
            if !self.sessions.contains_key(device) {
                return Err(SessionError::UnknownDevice { device: device.clone() });
            }
            return Ok(self.select(device));
        }

        let device = self.active.clone().ok_or(SessionError::NoActiveDevice)?;
        let session = self
            .sessions
            .get_mut(&device)
            .ok_or_else(|| SessionError::UnknownDevice { device: device.clone() })?;

        let actions = match command {
            OperatorCommand::Select(_) => Vec::new(),
            OperatorCommand::Trigger => session.set_trigger(true)?,
            OperatorCommand::ClearTrigger => session.set_trigger(false)?,
            OperatorCommand::ContinuousTrigger(state) => session.set_continuous_trigger(state)?,
            OperatorCommand::ProgramNumber(number) => session.set_program_number(number)?,
            OperatorCommand::ProgramChange(state) => session.set_program_change(state)?,
            OperatorCommand::Reset(state) => session.set_reset(state)?,
            OperatorCommand::WriteRegister { index, value_type, value } => {
                session.set_input_register(index, &value_type, value)?
            },
        };
        Ok(self.absorb(&device, actions, now))
    }

    /// Run detection on every session, then the due re-arm polls.
    pub fn tick(&mut self, now: Instant) -> Vec<DeviceAction> {
        let mut out = Vec::new();

        for device in self.order.clone() {
            if let Some(session) = self.sessions.get_mut(&device) {
                let actions = session.tick(now);
                out.extend(self.absorb(&device, actions, now));
            }
        }

        for device in self.rearm.due(now) {
            if let Some(session) = self.sessions.get_mut(&device) {
                let actions = session.poll_rearm();
                out.extend(self.absorb(&device, actions, now));
            } else {
                self.rearm.cancel(&device);
            }
        }

        out
    }

    /// Feed session actions through the registry.
    ///
    /// Re-arm requests go to the scheduler, the rest is tagged for the driver.
    pub fn absorb(
        &mut self,
        device: &str,
        actions: Vec<SessionAction>,
        now: Instant,
    ) -> Vec<DeviceAction> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                SessionAction::ArmRearm => self.rearm.arm(device, now),
                SessionAction::CancelRearm => {
                    self.rearm.cancel(device);
                },
                action => out.push(DeviceAction { device: device.to_string(), action }),
            }
        }
        out
    }
}

fn tag(device: &str, actions: Vec<SessionAction>) -> Vec<DeviceAction> {
    actions.into_iter().map(|action| DeviceAction { device: device.to_string(), action }).collect()
}
