//! Requests the console sends to the peer.

use std::fmt;

use crate::{
    DeviceId, FRONTEND_PERIPHERAL, Result,
    frame::{FrameKind, OutboundFrame},
    register::RegisterValue,
};

/// Control latch addressed by a `control` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Single inspection trigger.
    Trigger,
    /// Load the program selected by the last program number request.
    ProgramChange,
    /// Return the device to ready.
    Reset,
}

impl Control {
    /// Wire name used in the `data` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::ProgramChange => "program_change",
            Self::Reset => "reset",
        }
    }

    /// Look up a control by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "trigger" => Some(Self::Trigger),
            "program_change" => Some(Self::ProgramChange),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request frame, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Sent once every time a connection opens.
    Announce,

    /// Set or clear a control latch.
    Control {
        /// Target device.
        device: DeviceId,
        /// Which latch.
        control: Control,
        /// New latch value.
        value: bool,
    },

    /// Select the program to load on the next program change.
    ProgramNumber {
        /// Target device.
        device: DeviceId,
        /// Program number.
        number: i64,
    },

    /// Write one input register slot.
    InputRegister {
        /// Target device.
        device: DeviceId,
        /// Register slot.
        index: usize,
        /// Type name from the input schema.
        value_type: String,
        /// Value to write.
        value: RegisterValue,
    },
}

impl Request {
    /// Device the request targets, `None` for announcements.
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::Announce => None,
            Self::Control { device, .. }
            | Self::ProgramNumber { device, .. }
            | Self::InputRegister { device, .. } => Some(device),
        }
    }

    /// Wire representation.
    pub fn to_frame(&self) -> OutboundFrame {
        match self {
            Self::Announce => {
                let mut frame = OutboundFrame::new(FRONTEND_PERIPHERAL, FrameKind::Status);
                frame.data = Some("connected".into());
                frame
            },
            Self::Control { device, control, value } => {
                let mut frame = OutboundFrame::new(device.clone(), FrameKind::Request);
                frame.section = Some("control".into());
                frame.data = Some(control.as_str().into());
                frame.value = Some(value.to_string());
                frame
            },
            Self::ProgramNumber { device, number } => {
                let mut frame = OutboundFrame::new(device.clone(), FrameKind::Request);
                frame.section = Some("program_number".into());
                frame.value = Some(number.to_string());
                frame
            },
            Self::InputRegister { device, index, value_type, value } => {
                let mut frame = OutboundFrame::new(device.clone(), FrameKind::Request);
                frame.section = Some("inputs_register".into());
                frame.index = Some(index.to_string());
                frame.value_type = Some(value_type.clone());
                frame.value = Some(value.to_string());
                frame
            },
        }
    }

    /// Encode straight to JSON text.
    pub fn encode(&self) -> Result<String> {
        self.to_frame().encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_names_round_trip() {
        for control in [Control::Trigger, Control::ProgramChange, Control::Reset] {
            assert_eq!(Control::from_wire(control.as_str()), Some(control));
        }
        assert_eq!(Control::from_wire("start"), None);
    }

    #[test]
    fn announce_has_no_device() {
        assert_eq!(Request::Announce.device(), None);
        let request = Request::ProgramNumber { device: "camA".into(), number: 3 };
        assert_eq!(request.device(), Some("camA"));
    }
}
