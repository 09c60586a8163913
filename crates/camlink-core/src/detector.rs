//! Previous-observed shadows for change detection.
//!
//! Each tracked field group keeps a deep copy of the value it last reported.
//! Comparison is structural (`PartialEq` on the typed record), so pushing an
//! identical snapshot twice reports one change, not two.

use camlink_proto::{RegisterValue, Statistics, StatusBits, VariableSchema};

use crate::snapshot::{FieldGroup, Inputs, Outputs};

/// Last observed value of one field group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shadow<T> {
    previous: T,
}

impl<T: Clone + PartialEq> Shadow<T> {
    /// Shadow starting from `initial`.
    pub fn new(initial: T) -> Self {
        Self { previous: initial }
    }

    /// Compare `current` against the shadow.
    ///
    /// On inequality the shadow is replaced by a copy of `current` and the
    /// old value is returned. Returns `None` when nothing changed.
    pub fn observe(&mut self, current: &T) -> Option<T> {
        if self.previous == *current {
            return None;
        }
        Some(std::mem::replace(&mut self.previous, current.clone()))
    }

    /// Value as of the last observation.
    pub fn previous(&self) -> &T {
        &self.previous
    }
}

/// A change reported by one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Input register values changed.
    InputRegisters,
    /// Input schema changed.
    InputVariables,
    /// Status bits changed.
    Status {
        /// Bits before the change, for edge detection.
        previous: StatusBits,
    },
    /// Statistics changed.
    Statistics {
        /// Values before the change.
        previous: Statistics,
    },
    /// Acknowledged program number changed.
    ProgramNumberAcknowledge,
    /// Output register values changed.
    OutputRegisters,
    /// Output schema changed.
    OutputVariables,
}

impl Detection {
    /// Field group the change belongs to.
    pub fn group(&self) -> FieldGroup {
        match self {
            Self::InputRegisters => FieldGroup::InputRegisters,
            Self::InputVariables => FieldGroup::InputVariables,
            Self::Status { .. } => FieldGroup::Status,
            Self::Statistics { .. } => FieldGroup::Statistics,
            Self::ProgramNumberAcknowledge => FieldGroup::ProgramNumberAcknowledge,
            Self::OutputRegisters => FieldGroup::OutputRegisters,
            Self::OutputVariables => FieldGroup::OutputVariables,
        }
    }
}

/// Shadows for the input field groups.
#[derive(Debug, Clone, Default)]
pub struct InputShadows {
    registers: Shadow<Vec<RegisterValue>>,
    variables: Shadow<VariableSchema>,
}

impl InputShadows {
    /// Shadows initialised from `inputs`, so the first pass reports nothing.
    pub fn from_inputs(inputs: &Inputs) -> Self {
        Self {
            registers: Shadow::new(inputs.inputs_register.clone()),
            variables: Shadow::new(inputs.inputs_variables.clone()),
        }
    }

    /// Run one detection pass over the input groups.
    pub fn detect(&mut self, inputs: &Inputs) -> Vec<Detection> {
        let mut detections = Vec::new();
        if self.registers.observe(&inputs.inputs_register).is_some() {
            detections.push(Detection::InputRegisters);
        }
        if self.variables.observe(&inputs.inputs_variables).is_some() {
            detections.push(Detection::InputVariables);
        }
        detections
    }
}

/// Shadows for the output field groups.
#[derive(Debug, Clone, Default)]
pub struct OutputShadows {
    status: Shadow<StatusBits>,
    statistics: Shadow<Statistics>,
    program_number_acknowledge: Shadow<Option<i64>>,
    registers: Shadow<Vec<RegisterValue>>,
    variables: Shadow<VariableSchema>,
}

impl OutputShadows {
    /// Shadows initialised from `outputs`.
    pub fn from_outputs(outputs: &Outputs) -> Self {
        Self {
            status: Shadow::new(outputs.status),
            statistics: Shadow::new(outputs.statistics),
            program_number_acknowledge: Shadow::new(outputs.program_number_acknowledge),
            registers: Shadow::new(outputs.outputs_register.clone()),
            variables: Shadow::new(outputs.outputs_variables.clone()),
        }
    }

    /// Run one detection pass over the output groups.
    pub fn detect(&mut self, outputs: &Outputs) -> Vec<Detection> {
        let mut detections = Vec::new();
        if let Some(previous) = self.status.observe(&outputs.status) {
            detections.push(Detection::Status { previous });
        }
        if let Some(previous) = self.statistics.observe(&outputs.statistics) {
            detections.push(Detection::Statistics { previous });
        }
        if self.program_number_acknowledge.observe(&outputs.program_number_acknowledge).is_some() {
            detections.push(Detection::ProgramNumberAcknowledge);
        }
        if self.registers.observe(&outputs.outputs_register).is_some() {
            detections.push(Detection::OutputRegisters);
        }
        if self.variables.observe(&outputs.outputs_variables).is_some() {
            detections.push(Detection::OutputVariables);
        }
        detections
    }

    /// Status bits as of the last pass.
    pub fn status(&self) -> &StatusBits {
        self.status.previous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_reports_once_per_change() {
        let mut shadow = Shadow::new(vec![1, 2, 3]);
        assert_eq!(shadow.observe(&vec![1, 2, 3]), None);
        assert_eq!(shadow.observe(&vec![1, 2, 4]), Some(vec![1, 2, 3]));
        assert_eq!(shadow.observe(&vec![1, 2, 4]), None);
        assert_eq!(shadow.previous(), &vec![1, 2, 4]);
    }

    #[test]
    fn equal_contents_are_not_a_change() {
        let mut outputs = Outputs::default();
        let mut shadows = OutputShadows::from_outputs(&outputs);

        outputs.outputs_register = vec![RegisterValue::Int(1)];
        assert_eq!(shadows.detect(&outputs), vec![Detection::OutputRegisters]);

        // A fresh allocation with the same contents.
        outputs.outputs_register = vec![RegisterValue::Int(1)];
        assert!(shadows.detect(&outputs).is_empty());
    }

    #[test]
    fn status_detection_carries_previous_bits() {
        let mut outputs = Outputs::default();
        let mut shadows = OutputShadows::from_outputs(&outputs);

        outputs.status.ready = true;
        let detections = shadows.detect(&outputs);
        assert_eq!(detections, vec![Detection::Status { previous: StatusBits::default() }]);
        assert!(shadows.status().ready);
    }

    #[test]
    fn input_groups_detect_independently() {
        let mut inputs = Inputs::default();
        let mut shadows = InputShadows::from_inputs(&inputs);

        inputs.inputs_variables = vec![None];
        assert_eq!(shadows.detect(&inputs), vec![Detection::InputVariables]);

        inputs.inputs_register = vec![RegisterValue::Null];
        assert_eq!(shadows.detect(&inputs), vec![Detection::InputRegisters]);
    }
}
