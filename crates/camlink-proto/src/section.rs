//! Status section names.

use std::fmt;

/// A named slice of device state the peer pushes independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Input register values.
    InputsRegister,
    /// Input register schema.
    InputsVariables,
    /// Status bits.
    Status,
    /// Cycle time statistics.
    Statistics,
    /// Program number the device reports as loaded.
    ProgramNumberAcknowledge,
    /// Boolean output register.
    OutputsBoolRegister,
    /// Output register values.
    OutputsRegister,
    /// Output register schema.
    OutputsVariables,
}

impl Section {
    /// Every section, in wire documentation order.
    pub const ALL: [Self; 8] = [
        Self::InputsRegister,
        Self::InputsVariables,
        Self::Status,
        Self::Statistics,
        Self::ProgramNumberAcknowledge,
        Self::OutputsBoolRegister,
        Self::OutputsRegister,
        Self::OutputsVariables,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputsRegister => "inputs_register",
            Self::InputsVariables => "inputs_variables",
            Self::Status => "status",
            Self::Statistics => "statistics",
            Self::ProgramNumberAcknowledge => "program_number_acknowledge",
            Self::OutputsBoolRegister => "outputs_bool_register",
            Self::OutputsRegister => "outputs_register",
            Self::OutputsVariables => "outputs_variables",
        }
    }

    /// Look up a section by wire name. Unknown names return `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == name)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
