//! Error types for the core state machines.
//!
//! None of these are fatal. A [`SessionError`] means an operator command was
//! refused and nothing was sent; a [`LinkError`] means the driver fed the
//! link an event that does not apply to its current state.

use camlink_proto::DeviceId;
use thiserror::Error;

use crate::{handshake::CommandKind, link::LinkState};

/// Refusal of an operator command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session is not the active one, so it accepts no commands.
    #[error("device {device} is not active")]
    Inactive {
        /// Device the command targeted.
        device: DeviceId,
    },

    /// A previous request of the same kind is still outstanding, or the
    /// device still reports its acknowledge bit.
    #[error("{kind} request already pending")]
    CommandPending {
        /// Command kind that was refused.
        kind: CommandKind,
    },

    /// No device is active.
    #[error("no active device")]
    NoActiveDevice,

    /// The named device is not registered.
    #[error("unknown device {device}")]
    UnknownDevice {
        /// Requested device.
        device: DeviceId,
    },
}

/// Illegal link transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Event does not apply in the current state.
    #[error("invalid link state {state:?} for {operation}")]
    InvalidState {
        /// State the link was in.
        state: LinkState,
        /// Operation attempted.
        operation: &'static str,
    },
}
