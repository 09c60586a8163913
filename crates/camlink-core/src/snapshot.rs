//! Remote-mirrored device snapshots.

use std::fmt;

use camlink_proto::{RegisterValue, Statistics, StatusBits, Variable, VariableSchema};

/// Operator-authored side of a device, mirrored to the peer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    /// Trigger latch.
    pub trigger: bool,
    /// Automatic re-trigger after every new image.
    pub continuous_trigger: bool,
    /// Program change latch.
    pub program_change: bool,
    /// Reset latch.
    pub reset: bool,
    /// Last program number requested.
    pub program_number: Option<i64>,
    /// Input register values.
    pub inputs_register: Vec<RegisterValue>,
    /// Input register schema, supplied by the peer.
    pub inputs_variables: VariableSchema,
}

/// Device-authored side, read-only for the operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs {
    /// Status and feedback bits.
    pub status: StatusBits,
    /// Cycle time statistics.
    pub statistics: Statistics,
    /// Program number the device reports as loaded.
    pub program_number_acknowledge: Option<i64>,
    /// Boolean output register. Stored, not tracked for changes.
    pub outputs_bool_register: Vec<RegisterValue>,
    /// Output register values.
    pub outputs_register: Vec<RegisterValue>,
    /// Output register schema.
    pub outputs_variables: VariableSchema,
}

/// Unit of change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// [`Inputs::inputs_register`]
    InputRegisters,
    /// [`Inputs::inputs_variables`]
    InputVariables,
    /// [`Outputs::status`]
    Status,
    /// [`Outputs::statistics`]
    Statistics,
    /// [`Outputs::program_number_acknowledge`]
    ProgramNumberAcknowledge,
    /// [`Outputs::outputs_register`]
    OutputRegisters,
    /// [`Outputs::outputs_variables`]
    OutputVariables,
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InputRegisters => "input registers",
            Self::InputVariables => "input variables",
            Self::Status => "status",
            Self::Statistics => "statistics",
            Self::ProgramNumberAcknowledge => "program number acknowledge",
            Self::OutputRegisters => "output registers",
            Self::OutputVariables => "output variables",
        })
    }
}

/// One displayable register slot.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderField {
    /// Slot index in both the schema and the register array.
    pub index: usize,
    /// Variable name.
    pub name: String,
    /// Variable type name.
    pub value_type: String,
    /// Register value at the same slot, if the register is long enough.
    pub value: Option<RegisterValue>,
}

/// List the named slots of a register, skipping unused schema slots.
///
/// Pairing is positional: the value for a variable at slot `i` is
/// `registers[i]`, whether or not earlier slots were skipped.
pub fn render_fields(variables: &[Option<Variable>], registers: &[RegisterValue]) -> Vec<RenderField> {
    variables
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            slot.as_ref().map(|variable| RenderField {
                index,
                name: variable.name.clone(),
                value_type: variable.value_type.clone(),
                value: registers.get(index).cloned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_skips_null_slots() {
        let variables =
            vec![Some(Variable::new("temp", "float")), None, Some(Variable::new("id", "int"))];
        let registers = vec![
            RegisterValue::Float(12.5),
            RegisterValue::Text("x".into()),
            RegisterValue::Int(7),
        ];

        let fields = render_fields(&variables, &registers);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].index, 0);
        assert_eq!(fields[0].name, "temp");
        assert_eq!(fields[0].value, Some(RegisterValue::Float(12.5)));
        assert_eq!(fields[1].index, 2);
        assert_eq!(fields[1].name, "id");
        assert_eq!(fields[1].value, Some(RegisterValue::Int(7)));
        assert!(fields.iter().all(|f| f.value != Some(RegisterValue::Text("x".into()))));
    }

    #[test]
    fn render_short_register() {
        let variables = vec![Some(Variable::new("a", "int")), Some(Variable::new("b", "int"))];
        let fields = render_fields(&variables, &[RegisterValue::Int(1)]);
        assert_eq!(fields[1].value, None);
    }
}
