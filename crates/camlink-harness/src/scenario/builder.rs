//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use camlink_core::OperatorCommand;
use camlink_proto::StatusBits;

use crate::scenario::{OracleFn, World};

/// One scripted step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Operator command.
    Command(OperatorCommand),
    /// Let virtual time pass.
    Advance(Duration),
    /// Peer pushes a status for a device.
    Status {
        /// Device.
        device: String,
        /// New status bits.
        bits: StatusBits,
    },
}

/// Scenario builder.
///
/// Construct a scenario by listing the peer's devices and the steps to run.
/// Must call `.oracle()` to get a RunnableScenario that can be executed.
pub struct Scenario {
    name: String,
    devices: Vec<String>,
    seed: u64,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), devices: Vec::new(), seed: 0, steps: Vec::new() }
    }

    /// Add a device served by the peer.
    pub fn device(mut self, name: impl Into<String>) -> Self {
        self.devices.push(name.into());
        self
    }

    /// Seed for the peer's statistics.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Issue an operator command.
    pub fn command(mut self, command: OperatorCommand) -> Self {
        self.steps.push(Step::Command(command));
        self
    }

    /// Let `millis` of virtual time pass.
    pub fn advance_ms(mut self, millis: u64) -> Self {
        self.steps.push(Step::Advance(Duration::from_millis(millis)));
        self
    }

    /// Have the peer push a status for `device`.
    pub fn status(mut self, device: impl Into<String>, bits: StatusBits) -> Self {
        self.steps.push(Step::Status { device: device.into(), bits });
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Connects the console to the peer (announce, device list, full dump),
    /// runs every step in order, then runs the oracle on the final world.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, devices, seed, steps } = self.scenario;
        if devices.is_empty() {
            return Err(format!("Scenario '{name}': peer serves no devices"));
        }

        let device_names: Vec<&str> = devices.iter().map(String::as_str).collect();
        let mut world = World::new(&device_names, seed);
        world.connect();

        for step in steps {
            match step {
                Step::Command(command) => world.command(command),
                Step::Advance(duration) => world.advance(duration),
                Step::Status { device, bits } => world.push_status(&device, bits),
            }
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}
