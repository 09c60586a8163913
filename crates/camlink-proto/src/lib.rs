//! Wire format for the camlink device console protocol.
//!
//! Every message is a single JSON object sent as one websocket text frame.
//! The operator side sends requests (`type: "request"`) and one status
//! announcement when a connection opens. The peer pushes status snapshots
//! (`type: "status"`), one section at a time, plus a `manager` response that
//! lists the device identifiers it serves.
//!
//! Inbound frames are decoded loosely into [`InboundFrame`] and then
//! classified into a typed [`Message`]. Anything that does not match a known
//! shape classifies as [`Message::Ignored`] so that protocol extensions on the
//! peer never break an older console.
//!
//! Numeric and boolean request values travel as strings. The peer coerces
//! them back using the accompanying `value_type`.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod message;
pub mod register;
pub mod request;
pub mod section;
pub mod status;

pub use errors::{ProtocolError, Result};
pub use frame::{FrameKind, InboundFrame, OutboundFrame};
pub use message::{Message, SectionUpdate};
pub use register::{RegisterValue, Variable, VariableSchema};
pub use request::{Control, Request};
pub use section::Section;
pub use status::{Statistics, StatisticsField, StatusBits};

/// Identifier of one vision device, as announced by the peer.
pub type DeviceId = String;

/// Peripheral name the peer uses for registry-level responses.
pub const MANAGER_PERIPHERAL: &str = "manager";

/// Peripheral name the console uses for its own announcements.
pub const FRONTEND_PERIPHERAL: &str = "frontend";
