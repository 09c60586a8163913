//! Deterministic simulation harness for camlink.
//!
//! Turmoil-based implementations of the Environment and Connector traits, a
//! simulated inspection peer, and a scenario runner for deterministic,
//! reproducible testing of the console against the device protocol.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_connector;
pub mod sim_env;
pub mod sim_peer;
pub mod sink;

pub use model::{ModelDevice, ModelOutcome, Operation};
pub use sim_connector::SimConnector;
pub use sim_env::SimEnv;
pub use sim_peer::{SimDevice, SimPeer, serve};
pub use sink::RecordingSink;
