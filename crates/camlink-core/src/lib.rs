//! camlink core logic
//!
//! Pure state machine logic for keeping a local shadow of each inspection
//! device in sync with the peer, completely decoupled from I/O.
//!
//! # Architecture
//!
//! Every component here is a deterministic state machine. Time is passed in
//! as a parameter, nothing opens sockets or spawns timers, and every effect
//! is returned as a declarative action for a runtime or test harness to
//! execute. The same code runs in the console, in unit tests, and in the
//! simulation harness.
//!
//! # Components
//!
//! - [`session`]: per-device state session (change detection, handshakes)
//! - [`handshake`]: request/acknowledge transition table per command kind
//! - [`detector`]: typed previous-observed shadows
//! - [`snapshot`]: inputs and outputs records
//! - [`registry`]: device sessions and the active device
//! - [`router`]: inbound frame dispatch
//! - [`rearm`]: continuous trigger re-arm polls keyed by device
//! - [`link`]: reconnecting connection state machine
//! - [`command`]: operator commands
//! - [`mod@env`]: environment abstraction (time)
//! - [`transport`]: stream connector abstraction
//! - [`error`]: error types

pub mod command;
pub mod detector;
pub mod env;
pub mod error;
pub mod handshake;
pub mod link;
pub mod rearm;
pub mod registry;
pub mod router;
pub mod session;
pub mod snapshot;
pub mod transport;

pub use command::OperatorCommand;
pub use error::{LinkError, SessionError};
pub use registry::{DeviceAction, Registry};
pub use session::{DetectionConfig, DeviceSession, SessionAction, ViewUpdate};
