//! Operator commands.
//!
//! Everything the operator can ask of the active device. Commands are applied
//! through [`crate::Registry::apply`], which routes them to the active
//! session (or changes which session is active).

use camlink_proto::{DeviceId, RegisterValue};

/// A command issued by the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// Make this device the active one.
    Select(DeviceId),
    /// Request one trigger.
    Trigger,
    /// Clear the trigger latch, releasing a request the device never saw.
    ClearTrigger,
    /// Enable or disable continuous trigger mode.
    ContinuousTrigger(bool),
    /// Select the program number.
    ProgramNumber(i64),
    /// Raise or clear the program change latch.
    ProgramChange(bool),
    /// Raise or clear the reset latch.
    Reset(bool),
    /// Write one input register slot.
    WriteRegister {
        /// Register slot.
        index: usize,
        /// Type name, as listed in the input schema.
        value_type: String,
        /// Value to write.
        value: RegisterValue,
    },
}

impl OperatorCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Trigger => "trigger",
            Self::ClearTrigger => "clear_trigger",
            Self::ContinuousTrigger(_) => "continuous_trigger",
            Self::ProgramNumber(_) => "program_number",
            Self::ProgramChange(_) => "program_change",
            Self::Reset(_) => "reset",
            Self::WriteRegister { .. } => "write_register",
        }
    }
}
