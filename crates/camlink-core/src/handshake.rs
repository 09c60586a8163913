//! Request/acknowledge handshake for device commands.
//!
//! There is no acknowledge message on the wire. The console raises a latch
//! with a request frame, and the device answers by raising a status bit. A
//! rising edge of the acknowledge or error bit for a latch that is still
//! requested makes the console clear the latch with a second request frame.
//!
//! # State Machine
//!
//! ```text
//!              Request (guarded for Trigger)
//! ┌──────┐ ──────────────────────────────> ┌───────────┐
//! │ Idle │                                  │ Requested │
//! └──────┘ <────────────────────────────── └───────────┘
//!            Clear, or Feedback edge (ack/error rising)
//! ```
//!
//! The latch goes back to Idle as soon as the clearing frame is sent. The
//! console does not wait for the device to drop its acknowledge bit.
//!
//! Reset has no feedback bits. It stays Requested until the operator clears
//! it.

use std::fmt;

use camlink_proto::{Control, StatusBits};

/// Command kinds that follow the latch handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Single trigger.
    Trigger,
    /// Program change.
    ProgramChange,
    /// Reset.
    Reset,
}

impl CommandKind {
    /// Control the command is sent as.
    pub fn control(self) -> Control {
        match self {
            Self::Trigger => Control::Trigger,
            Self::ProgramChange => Control::ProgramChange,
            Self::Reset => Control::Reset,
        }
    }

    /// Rising edges of this command's acknowledge and error bits between two
    /// status snapshots. Reset has no feedback bits.
    pub fn feedback(self, previous: &StatusBits, current: &StatusBits) -> Feedback {
        let (ack_before, ack_now, err_before, err_now) = match self {
            Self::Trigger => (
                previous.trigger_acknowledge,
                current.trigger_acknowledge,
                previous.trigger_error,
                current.trigger_error,
            ),
            Self::ProgramChange => (
                previous.program_change_acknowledge,
                current.program_change_acknowledge,
                previous.program_change_error,
                current.program_change_error,
            ),
            Self::Reset => return Feedback::default(),
        };
        Feedback {
            acknowledged: rising(ack_before, ack_now),
            errored: rising(err_before, err_now),
        }
    }
}

impl From<Control> for CommandKind {
    fn from(control: Control) -> Self {
        match control {
            Control::Trigger => Self::Trigger,
            Control::ProgramChange => Self::ProgramChange,
            Control::Reset => Self::Reset,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.control().as_str())
    }
}

/// Rising edges observed on a command's feedback bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Feedback {
    /// Acknowledge bit went false to true.
    pub acknowledged: bool,
    /// Error bit went false to true.
    pub errored: bool,
}

impl Feedback {
    /// Either bit rose.
    pub fn any(self) -> bool {
        self.acknowledged || self.errored
    }
}

/// `false -> true` transition. A bit that stays true is not an edge.
pub fn rising(previous: bool, current: bool) -> bool {
    !previous && current
}

/// State of one command latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LatchState {
    /// No outstanding request.
    #[default]
    Idle,
    /// Request sent, not yet cleared.
    Requested,
}

impl LatchState {
    /// State corresponding to a latch boolean.
    pub fn from_latch(latch: bool) -> Self {
        if latch { Self::Requested } else { Self::Idle }
    }

    /// Latch boolean for this state.
    pub fn is_requested(self) -> bool {
        self == Self::Requested
    }
}

/// Input to the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// Operator asks to raise the latch.
    Request {
        /// Device currently reports the acknowledge bit for this command.
        acknowledge_high: bool,
    },
    /// Operator asks to drop the latch.
    Clear,
    /// Rising edge of the acknowledge or error bit.
    Feedback,
}

/// Result of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Send a control request with this value.
    Send(bool),
    /// Request refused by the guard. Nothing is sent.
    Refused,
    /// Nothing to do.
    Unchanged,
}

/// The handshake transition table.
///
/// | kind           | state     | event            | next      | outcome     |
/// |----------------|-----------|------------------|-----------|-------------|
/// | Trigger        | Idle      | Request, ack low | Requested | Send(true)  |
/// | Trigger        | Idle      | Request, ack high| Idle      | Refused     |
/// | Trigger        | Requested | Request          | Requested | Refused     |
/// | ProgramChange, Reset | any | Request          | Requested | Send(true)  |
/// | Trigger        | Requested | Clear / Feedback | Idle      | Send(false) |
/// | Trigger        | Idle      | Clear            | Idle      | Unchanged   |
/// | ProgramChange, Reset | any | Clear            | Idle      | Send(false) |
/// | ProgramChange  | Requested | Feedback         | Idle      | Send(false) |
/// | any            | Idle      | Feedback         | Idle      | Unchanged   |
/// | Reset          | Requested | Feedback         | Requested | Unchanged   |
pub fn transition(kind: CommandKind, state: LatchState, event: HandshakeEvent) -> (LatchState, Outcome) {
    use CommandKind::{ProgramChange, Reset, Trigger};
    use HandshakeEvent::{Clear, Feedback, Request};
    use LatchState::{Idle, Requested};

    match (kind, state, event) {
        (Trigger, Idle, Request { acknowledge_high: false }) => (Requested, Outcome::Send(true)),
        (Trigger, Idle, Request { acknowledge_high: true }) => (Idle, Outcome::Refused),
        (Trigger, Requested, Request { .. }) => (Requested, Outcome::Refused),
        (ProgramChange | Reset, _, Request { .. }) => (Requested, Outcome::Send(true)),

        (Trigger, Requested, Clear | Feedback) => (Idle, Outcome::Send(false)),
        (Trigger, Idle, Clear) => (Idle, Outcome::Unchanged),
        (ProgramChange | Reset, _, Clear) => (Idle, Outcome::Send(false)),

        (ProgramChange, Requested, Feedback) => (Idle, Outcome::Send(false)),
        (_, Idle, Feedback) => (Idle, Outcome::Unchanged),
        (Reset, Requested, Feedback) => (Requested, Outcome::Unchanged),
    }
}
