//! Stream connector abstraction.
//!
//! The websocket link runs over any byte stream. Production dials real TCP,
//! tests dial turmoil's simulated TCP so reconnect behaviour can be exercised
//! with partitions and virtual time.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens byte streams to the peer.
///
/// Each call is one connection attempt. The link calls it again after every
/// close or error, so implementations must not cache a broken stream.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Bidirectional byte stream to the peer.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream.
    async fn connect(&self) -> io::Result<Self::Stream>;
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use super::*;

    struct Loopback;

    #[async_trait]
    impl Connector for Loopback {
        type Stream = DuplexStream;

        async fn connect(&self) -> io::Result<DuplexStream> {
            let (near, _far) = tokio::io::duplex(64);
            Ok(near)
        }
    }

    fn connector_bound<C: Connector>(_: &C) -> bool {
        true
    }

    #[test]
    fn in_memory_stream_is_a_connector_stream() {
        assert!(connector_bound(&Loopback));
    }
}
