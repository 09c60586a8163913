//! Raw frame shapes.
//!
//! [`InboundFrame`] is deliberately permissive: only `peripheral` and `type`
//! are required, and `data`/`value` are kept as untyped JSON until the frame
//! is classified. [`OutboundFrame`] is the exact object the console puts on
//! the wire, with every value already stringified.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, Result};

/// Value of the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Operator request to a device.
    Request,
    /// State push or announcement.
    Status,
    /// Registry-level answer from the peer.
    Response,
}

/// A frame received from the peer, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Device identifier, or `"manager"`.
    pub peripheral: String,
    /// Frame type, kept as text so unknown types classify as ignored.
    #[serde(rename = "type")]
    pub kind: String,
    /// Section name for status pushes.
    #[serde(default)]
    pub section: Option<String>,
    /// Payload of registry responses.
    #[serde(default)]
    pub data: Option<Value>,
    /// Payload of status pushes.
    #[serde(default)]
    pub value: Option<Value>,
}

impl InboundFrame {
    /// Decode one websocket text message.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

/// A frame sent by the console.
///
/// Field order matches the order the peer historically receives them in:
/// `peripheral`, `type`, `section`, `data`, `index`, `value_type`, `value`.
/// Absent fields are omitted entirely rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Target device, or `"frontend"` for announcements.
    pub peripheral: String,
    /// Frame type.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Request section (`control`, `program_number`, `inputs_register`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Control name or announcement text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Stringified register index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Register value type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Stringified value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl OutboundFrame {
    /// Frame addressed to `peripheral` with no optional fields set.
    pub fn new(peripheral: impl Into<String>, kind: FrameKind) -> Self {
        Self {
            peripheral: peripheral.into(),
            kind,
            section: None,
            data: None,
            index: None,
            value_type: None,
            value: None,
        }
    }

    /// Serialize to a single-line JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse a frame previously produced by [`OutboundFrame::encode`].
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
