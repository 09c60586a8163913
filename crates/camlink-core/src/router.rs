//! Inbound frame dispatch.
//!
//! Routes classified peer messages into the registry: device lists
//! bootstrap sessions, status pushes replace one section of one device's
//! snapshot. Everything else is dropped. Unknown peripherals and sections
//! are expected (newer peers may send more) and are not errors.

use std::time::Instant;

use camlink_proto::{DeviceId, InboundFrame, Message, Section};
use tracing::debug;

use crate::registry::{DeviceAction, Registry};

/// What the router did with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Device list processed.
    Bootstrapped {
        /// Devices seen for the first time.
        created: Vec<DeviceId>,
    },
    /// Section snapshot stored.
    Applied {
        /// Target device.
        device: DeviceId,
        /// Section replaced.
        section: Section,
    },
    /// Dropped.
    Ignored {
        /// Why.
        reason: String,
    },
}

/// Dispatch a decoded frame.
pub fn dispatch_frame(
    registry: &mut Registry,
    frame: InboundFrame,
    now: Instant,
) -> (DispatchOutcome, Vec<DeviceAction>) {
    dispatch(registry, Message::classify(frame), now)
}

/// Dispatch a classified message.
///
/// The decoded payload is moved into the session, so the snapshot never
/// shares state with the transport.
pub fn dispatch(
    registry: &mut Registry,
    message: Message,
    now: Instant,
) -> (DispatchOutcome, Vec<DeviceAction>) {
    match message {
        Message::DeviceList(devices) => {
            let (created, actions) = registry.bootstrap(&devices, now);
            debug!(?devices, created = created.len(), "device list");
            (DispatchOutcome::Bootstrapped { created }, actions)
        },
        Message::Status { device, update } => match registry.session_mut(&device) {
            Some(session) => {
                let section = update.section();
                session.apply(update);
                (DispatchOutcome::Applied { device, section }, Vec::new())
            },
            None => {
                debug!(device, "status for unknown device");
                (DispatchOutcome::Ignored { reason: format!("unknown device {device}") }, Vec::new())
            },
        },
        Message::Ignored { reason } => {
            debug!(reason, "frame ignored");
            (DispatchOutcome::Ignored { reason }, Vec::new())
        },
    }
}
