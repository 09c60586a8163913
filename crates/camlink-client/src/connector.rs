//! TCP connector for production.

use std::io;

use async_trait::async_trait;
use camlink_core::transport::Connector;
use tokio::net::TcpStream;
use url::Url;

use crate::error::TransportError;

/// Dials the peer over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Connector for `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Connector for the host and port of a `ws://` URL.
    pub fn from_url(url: &str) -> Result<Self, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != "ws" {
            return Err(invalid("only ws:// is supported"));
        }
        let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = parsed.port_or_known_default().ok_or_else(|| invalid("missing port"))?;
        Ok(Self::new(format!("{host}:{port}")))
    }

    /// Address dialed.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
