//! Reference model of the command handshake.
//!
//! A deliberately naive, flag-based restatement of the handshake rules for
//! one active device. Property tests run the same [`Operation`] sequence
//! against the model and against a real `DeviceSession` and require the same
//! outbound control requests and the same latch states.

use arbitrary::Arbitrary;
use camlink_proto::{Control, StatusBits};

/// Operations on a single active device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Operator requests a trigger.
    Trigger,
    /// Operator clears the trigger latch.
    ClearTrigger,
    /// Operator raises or clears the program change latch.
    ProgramChange(bool),
    /// Operator raises or clears the reset latch.
    Reset(bool),
    /// The device pushes a status, then one detection pass runs.
    ///
    /// Bit order: ready, run, trigger acknowledge, program change
    /// acknowledge, trigger error, program change error, new image.
    Status(u8),
}

impl Operation {
    /// Status bits encoded in a [`Operation::Status`] byte.
    pub fn status_bits(bits: u8) -> StatusBits {
        let bit = |n: u8| bits & (1 << n) != 0;
        StatusBits {
            ready: bit(0),
            run: bit(1),
            trigger_acknowledge: bit(2),
            program_change_acknowledge: bit(3),
            trigger_error: bit(4),
            program_change_error: bit(5),
            new_image: bit(6),
        }
    }
}

/// What one operation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOutcome {
    /// Control requests sent, in order.
    pub sent: Vec<(Control, bool)>,
    /// The operator request was refused.
    pub refused: bool,
}

/// Reference device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDevice {
    /// Trigger latch.
    pub trigger: bool,
    /// Program change latch.
    pub program_change: bool,
    /// Reset latch.
    pub reset: bool,
    /// Last status seen.
    pub status: StatusBits,
}

impl ModelDevice {
    /// Apply one operation.
    pub fn apply(&mut self, op: Operation) -> ModelOutcome {
        let mut outcome = ModelOutcome::default();
        match op {
            Operation::Trigger => {
                if self.trigger || self.status.trigger_acknowledge {
                    outcome.refused = true;
                } else {
                    self.trigger = true;
                    outcome.sent.push((Control::Trigger, true));
                }
            },
            Operation::ClearTrigger => {
                if self.trigger {
                    self.trigger = false;
                    outcome.sent.push((Control::Trigger, false));
                }
            },
            Operation::ProgramChange(value) => {
                self.program_change = value;
                outcome.sent.push((Control::ProgramChange, value));
            },
            Operation::Reset(value) => {
                self.reset = value;
                outcome.sent.push((Control::Reset, value));
            },
            Operation::Status(bits) => {
                let new = Operation::status_bits(bits);
                let old = self.status;
                self.status = new;

                let trigger_edge = (!old.trigger_acknowledge && new.trigger_acknowledge)
                    || (!old.trigger_error && new.trigger_error);
                if trigger_edge && self.trigger {
                    self.trigger = false;
                    outcome.sent.push((Control::Trigger, false));
                }

                let program_edge = (!old.program_change_acknowledge && new.program_change_acknowledge)
                    || (!old.program_change_error && new.program_change_error);
                if program_edge && self.program_change {
                    self.program_change = false;
                    outcome.sent.push((Control::ProgramChange, false));
                }
            },
        }
        outcome
    }
}
