//! Typed classification of inbound frames.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    DeviceId, MANAGER_PERIPHERAL, ProtocolError, Result,
    frame::InboundFrame,
    register::{RegisterValue, VariableSchema},
    section::Section,
    status::{Statistics, StatusBits},
};

/// New snapshot for one status section.
///
/// Values are owned and fully decoded, so nothing here aliases the decoder's
/// buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionUpdate {
    /// `inputs_register`
    InputsRegister(Vec<RegisterValue>),
    /// `inputs_variables`
    InputsVariables(VariableSchema),
    /// `status`
    Status(StatusBits),
    /// `statistics`
    Statistics(Statistics),
    /// `program_number_acknowledge`
    ProgramNumberAcknowledge(Option<i64>),
    /// `outputs_bool_register`
    OutputsBoolRegister(Vec<RegisterValue>),
    /// `outputs_register`
    OutputsRegister(Vec<RegisterValue>),
    /// `outputs_variables`
    OutputsVariables(VariableSchema),
}

impl SectionUpdate {
    /// Decode the `value` of a status push for `section`.
    pub fn decode(section: Section, value: Value) -> Result<Self> {
        Ok(match section {
            Section::InputsRegister => Self::InputsRegister(typed(section, value)?),
            Section::InputsVariables => Self::InputsVariables(typed(section, value)?),
            Section::Status => Self::Status(typed(section, value)?),
            Section::Statistics => Self::Statistics(typed(section, value)?),
            Section::ProgramNumberAcknowledge => {
                Self::ProgramNumberAcknowledge(program_number(section, value)?)
            },
            Section::OutputsBoolRegister => Self::OutputsBoolRegister(typed(section, value)?),
            Section::OutputsRegister => Self::OutputsRegister(typed(section, value)?),
            Section::OutputsVariables => Self::OutputsVariables(typed(section, value)?),
        })
    }

    /// Section this update belongs to.
    pub fn section(&self) -> Section {
        match self {
            Self::InputsRegister(_) => Section::InputsRegister,
            Self::InputsVariables(_) => Section::InputsVariables,
            Self::Status(_) => Section::Status,
            Self::Statistics(_) => Section::Statistics,
            Self::ProgramNumberAcknowledge(_) => Section::ProgramNumberAcknowledge,
            Self::OutputsBoolRegister(_) => Section::OutputsBoolRegister,
            Self::OutputsRegister(_) => Section::OutputsRegister,
            Self::OutputsVariables(_) => Section::OutputsVariables,
        }
    }
}

fn typed<T: DeserializeOwned>(section: Section, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|source| ProtocolError::MalformedSection { section: section.as_str(), source })
}

// Some peers send the acknowledged program as a string.
fn program_number(section: Section, value: Value) -> Result<Option<i64>> {
    match value {
        Value::String(text) => match text.trim().parse() {
            Ok(number) => Ok(Some(number)),
            Err(_) => typed(section, Value::String(text)),
        },
        other => typed(section, other),
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `manager` response listing the served devices, in peer order.
    DeviceList(Vec<DeviceId>),

    /// Status push for one device section.
    Status {
        /// Device the push is for. May be unknown to the registry.
        device: DeviceId,
        /// Decoded snapshot.
        update: SectionUpdate,
    },

    /// Anything else. Kept for logging.
    Ignored {
        /// Short description of why the frame was not classified.
        reason: String,
    },
}

impl Message {
    /// Classify a decoded frame.
    ///
    /// Malformed section payloads classify as [`Message::Ignored`] rather than
    /// failing, matching the tolerance applied to unknown sections.
    pub fn classify(frame: InboundFrame) -> Self {
        let InboundFrame { peripheral, kind, section, data, value } = frame;

        if peripheral == MANAGER_PERIPHERAL {
            if kind != "response" {
                return Self::Ignored { reason: format!("manager frame of type {kind:?}") };
            }
            return match data.map(serde_json::from_value::<Vec<DeviceId>>) {
                Some(Ok(devices)) => Self::DeviceList(devices),
                Some(Err(e)) => Self::Ignored { reason: format!("malformed device list: {e}") },
                None => Self::Ignored { reason: "device list without data".into() },
            };
        }

        if kind != "status" {
            return Self::Ignored { reason: format!("frame of type {kind:?}") };
        }

        let Some(section_name) = section else {
            return Self::Ignored { reason: "status frame without section".into() };
        };
        let Some(section) = Section::from_wire(&section_name) else {
            return Self::Ignored { reason: format!("unknown section {section_name:?}") };
        };

        match SectionUpdate::decode(section, value.unwrap_or(Value::Null)) {
            Ok(update) => Self::Status { device: peripheral, update },
            Err(e) => Self::Ignored { reason: e.to_string() },
        }
    }

    /// Decode and classify one websocket text message.
    pub fn parse(text: &str) -> Result<Self> {
        InboundFrame::decode(text).map(Self::classify)
    }
}
