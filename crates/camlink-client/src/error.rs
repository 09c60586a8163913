//! Transport errors.

use camlink_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the transport handle.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No connection is open. The request was dropped.
    #[error("not connected, request dropped")]
    NotConnected,

    /// The link task has exited.
    #[error("transport closed")]
    Closed,

    /// The request could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),

    /// The peer URL cannot be dialed.
    #[error("invalid peer url {url}: {reason}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// What is wrong with it.
        reason: String,
    },
}
