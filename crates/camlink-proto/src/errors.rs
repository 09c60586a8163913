//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire frames.
///
/// None of these are fatal to a session. The router drops a frame that fails
/// to decode and keeps going.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame text is not a JSON object with the mandatory fields.
    #[error("invalid frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// A status section carried a value of the wrong shape.
    #[error("malformed {section} section: {source}")]
    MalformedSection {
        /// Wire name of the section.
        section: &'static str,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
