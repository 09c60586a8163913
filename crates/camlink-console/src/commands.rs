//! Command parsing for the operator console.
//!
//! This module parses input lines into structured [`Command`] values. Every
//! command starts with `/`.

use camlink_core::OperatorCommand;
use camlink_proto::RegisterValue;

/// Highest selectable program number.
pub const MAX_PROGRAM: i64 = 999;

/// Parsed command from operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Operator commands to apply, in order.
    Apply(Vec<OperatorCommand>),

    /// Print the command list.
    Help,

    /// Quit the console.
    Quit,

    /// Blank line.
    Empty,

    /// Unknown command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Usage text for `/help`.
pub const HELP: &str = "\
/select <device>            make a device active
/trigger [off]              request one trigger (or clear the latch)
/continuous on|off          automatic re-trigger after each image
/program <n>                select program n (0-999) and change to it
/number <n>                 select program n without changing
/change on|off              raise or clear the program change latch
/reset [off]                raise (or clear) the reset latch
/write <index> <type> <v>   write an input register slot
/quit                       exit";

/// Parse an input line into a command.
pub fn parse(input: &str) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Empty;
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");
    let apply = Command::Apply;

    match command {
        "select" | "s" => match parts.get(1) {
            Some(device) => apply(vec![OperatorCommand::Select((*device).to_string())]),
            None => invalid("select", "Usage: /select <device>"),
        },

        "trigger" | "t" => match parts.get(1).copied().map(on_off) {
            None | Some(Some(true)) => apply(vec![OperatorCommand::Trigger]),
            Some(Some(false)) => apply(vec![OperatorCommand::ClearTrigger]),
            Some(None) => invalid("trigger", "Usage: /trigger [on|off]"),
        },

        "continuous" => match parts.get(1).copied().map(on_off) {
            Some(Some(state)) => apply(vec![OperatorCommand::ContinuousTrigger(state)]),
            _ => invalid("continuous", "Usage: /continuous on|off"),
        },

        "program" | "p" => match parts.get(1).map(|n| n.parse::<i64>()) {
            Some(Ok(number)) => apply(vec![
                OperatorCommand::ProgramNumber(clamp_program(number)),
                OperatorCommand::ProgramChange(true),
            ]),
            Some(Err(_)) => invalid("program", "Invalid program number"),
            None => invalid("program", "Usage: /program <n>"),
        },

        "number" => match parts.get(1).map(|n| n.parse::<i64>()) {
            Some(Ok(number)) => apply(vec![OperatorCommand::ProgramNumber(clamp_program(number))]),
            Some(Err(_)) => invalid("number", "Invalid program number"),
            None => invalid("number", "Usage: /number <n>"),
        },

        "change" => match parts.get(1).copied().map(on_off) {
            Some(Some(state)) => apply(vec![OperatorCommand::ProgramChange(state)]),
            _ => invalid("change", "Usage: /change on|off"),
        },

        "reset" => match parts.get(1).copied() {
            None => apply(vec![OperatorCommand::Reset(true)]),
            Some(arg) => match on_off(arg) {
                Some(state) => apply(vec![OperatorCommand::Reset(state)]),
                None => invalid("reset", "Usage: /reset [on|off]"),
            },
        },

        "write" | "w" => parse_write(&parts[1..]),

        "help" | "h" => Command::Help,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

/// Clamp a program number to the selectable range.
pub fn clamp_program(number: i64) -> i64 {
    number.clamp(0, MAX_PROGRAM)
}

fn parse_write(args: &[&str]) -> Command {
    let [index, value_type, value @ ..] = args else {
        return invalid("write", "Usage: /write <index> <type> <value>");
    };
    if value.is_empty() {
        return invalid("write", "Usage: /write <index> <type> <value>");
    }
    let Ok(index) = index.parse::<usize>() else {
        return invalid("write", "Invalid register index");
    };

    let text = value.join(" ");
    Command::Apply(vec![OperatorCommand::WriteRegister {
        index,
        value_type: (*value_type).to_string(),
        value: RegisterValue::coerce(value_type, &text),
    }])
}

fn on_off(arg: &str) -> Option<bool> {
    match arg {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn invalid(command: &str, error: &str) -> Command {
    Command::InvalidArgs { command: command.into(), error: error.into() }
}
