//! camlink client
//!
//! The I/O shell around `camlink-core`. A [`LinkTask`] owns the websocket and
//! executes the core link state machine; the [`Runtime`] owns the device
//! registry, drives detection on a fixed cadence, routes peer messages, and
//! forwards view updates to a [`ViewSink`].
//!
//! ```text
//!  operator ──commands──> Runtime ──requests──> TransportHandle ──> LinkTask ──> peer
//!                           ▲  │                                      │
//!                           │  └──views──> ViewSink                   │
//!                           └────────────── TransportEvent <──────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connector;
pub mod env;
pub mod error;
pub mod runtime;
pub mod transport;

pub use config::ClientConfig;
pub use connector::TcpConnector;
pub use env::SystemEnv;
pub use error::TransportError;
pub use runtime::{Runtime, ViewSink};
pub use transport::{LinkTask, TransportEvent, TransportHandle, transport};
