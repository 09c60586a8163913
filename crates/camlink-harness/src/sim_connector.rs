//! Turmoil connector.

use std::io;

use async_trait::async_trait;
use camlink_core::transport::Connector;
use turmoil::net::TcpStream;

/// Dials a turmoil host over simulated TCP.
#[derive(Debug, Clone)]
pub struct SimConnector {
    addr: String,
}

impl SimConnector {
    /// Connector for `host:port` inside the simulation.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for SimConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect(self.addr.as_str()).await
    }
}
