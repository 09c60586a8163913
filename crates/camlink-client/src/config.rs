//! Client configuration.

use camlink_core::{DetectionConfig, link::LinkConfig};

/// Configuration for a console client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket URL of the peer.
    pub url: String,
    /// Reconnect behaviour.
    pub link: LinkConfig,
    /// Detection cadence.
    pub detection: DetectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            link: LinkConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}
