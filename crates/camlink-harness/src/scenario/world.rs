//! World state for scenario execution.
//!
//! The World wires a real [`Registry`] to a [`SimPeer`] through the wire
//! encoding, without a network: every request is encoded, handed to the
//! peer, and every reply is parsed and routed back. Time is virtual and only
//! moves when a step advances it.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use camlink_core::{
    DetectionConfig, DeviceAction, OperatorCommand, Registry, SessionAction, SessionError,
    ViewUpdate, router, snapshot::FieldGroup,
};
use camlink_proto::{DeviceId, Message, Request, StatusBits};

use crate::sim_peer::SimPeer;

/// World state containing the console side, the peer, and what passed
/// between them.
pub struct World {
    registry: Registry,
    peer: SimPeer,
    now: Instant,
    period: Duration,
    sent: Vec<Request>,
    views: Vec<(DeviceId, ViewUpdate)>,
    changes: Vec<(DeviceId, FieldGroup)>,
    refused: Vec<SessionError>,
}

impl World {
    /// World with a peer serving `devices`.
    pub fn new(devices: &[&str], seed: u64) -> Self {
        let config = DetectionConfig::default();
        Self {
            period: config.inputs_period.min(config.outputs_period).min(config.rearm_period),
            registry: Registry::new(config),
            peer: SimPeer::new(devices, seed),
            now: Instant::now(),
            sent: Vec::new(),
            views: Vec::new(),
            changes: Vec::new(),
            refused: Vec::new(),
        }
    }

    /// Announce the console to the peer, as the link does on open.
    pub fn connect(&mut self) {
        self.transmit(Request::Announce);
    }

    /// Apply an operator command. Refusals are recorded, not returned.
    pub fn command(&mut self, command: OperatorCommand) {
        match self.registry.apply(command, self.now) {
            Ok(actions) => self.execute(actions),
            Err(e) => self.refused.push(e),
        }
    }

    /// Let `duration` of virtual time pass, ticking the registry at the
    /// detection period.
    pub fn advance(&mut self, duration: Duration) {
        let end = self.now + duration;
        while self.now + self.period <= end {
            self.now += self.period;
            let actions = self.registry.tick(self.now);
            self.execute(actions);
        }
        self.now = end;
    }

    /// Make the peer push a status for `device`.
    pub fn push_status(&mut self, device: &str, bits: StatusBits) {
        let replies = self.peer.set_status(device, bits);
        self.deliver(replies);
    }

    /// Console-side registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The peer.
    pub fn peer(&self) -> &SimPeer {
        &self.peer
    }

    /// Every request the console sent, announcements included.
    pub fn sent(&self) -> &[Request] {
        &self.sent
    }

    /// View updates shown, in order.
    pub fn views(&self) -> &[(DeviceId, ViewUpdate)] {
        &self.views
    }

    /// Change notifications, in order.
    pub fn changes(&self) -> &[(DeviceId, FieldGroup)] {
        &self.changes
    }

    /// Refused operator commands.
    pub fn refused(&self) -> &[SessionError] {
        &self.refused
    }

    /// Current virtual time.
    pub fn now(&self) -> Instant {
        self.now
    }

    fn transmit(&mut self, request: Request) {
        let replies = match request.encode() {
            Ok(text) => self.peer.handle(&text),
            Err(_) => Vec::new(),
        };
        self.sent.push(request);
        self.deliver(replies);
    }

    fn deliver(&mut self, replies: Vec<String>) {
        let mut queue: VecDeque<String> = replies.into();
        while let Some(text) = queue.pop_front() {
            let Ok(message) = Message::parse(&text) else { continue };
            let (_, actions) = router::dispatch(&mut self.registry, message, self.now);
            for DeviceAction { device, action } in actions {
                match action {
                    SessionAction::Send(request) => {
                        let replies = request.encode().map(|t| self.peer.handle(&t)).unwrap_or_default();
                        self.sent.push(request);
                        queue.extend(replies);
                    },
                    other => self.record(device, other),
                }
            }
        }
    }

    fn execute(&mut self, actions: Vec<DeviceAction>) {
        for DeviceAction { device, action } in actions {
            match action {
                SessionAction::Send(request) => self.transmit(request),
                other => self.record(device, other),
            }
        }
    }

    fn record(&mut self, device: DeviceId, action: SessionAction) {
        match action {
            SessionAction::View(update) => self.views.push((device, update)),
            SessionAction::Changed(group) => self.changes.push((device, group)),
            SessionAction::Send(_) | SessionAction::ArmRearm | SessionAction::CancelRearm => {},
        }
    }
}
