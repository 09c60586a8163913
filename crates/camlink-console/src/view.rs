//! Text rendering of view updates.

use camlink_core::{ViewUpdate, snapshot::RenderField};
use camlink_proto::{RegisterValue, StatusBits};

use crate::commands::clamp_program;

/// Lines to print for one view update of `device`.
pub fn render(device: &str, update: &ViewUpdate) -> Vec<String> {
    match update {
        ViewUpdate::Image => vec![format!("[{device}] new image")],
        ViewUpdate::InputFields(fields) => fields_block(device, "inputs", fields),
        ViewUpdate::OutputFields(fields) => fields_block(device, "outputs", fields),
        ViewUpdate::Status(bits) => vec![format!("[{device}] status {}", status_line(bits))],
        ViewUpdate::Statistic { field, seconds } => {
            vec![format!("[{device}] {field} {}", format_millis(*seconds))]
        },
        ViewUpdate::ProgramNumber(number) => {
            vec![format!("[{device}] program {}", format_program(*number))]
        },
    }
}

/// Register value as displayed for a schema type.
///
/// `float` values get two decimals, `string` values are shown verbatim,
/// anything else in its raw form.
pub fn format_register(value_type: &str, value: Option<&RegisterValue>) -> String {
    let Some(value) = value else { return "-".to_string() };
    match (value_type, value) {
        ("float", value) => match value.as_f64() {
            Some(number) => format!("{number:.2}"),
            None => value.to_string(),
        },
        (_, value) => value.to_string(),
    }
}

/// Seconds as milliseconds with two decimals.
pub fn format_millis(seconds: f64) -> String {
    format!("{:.2} ms", seconds * 1000.0)
}

/// Program number clamped to 0..=999, zero-padded to three digits.
pub fn format_program(number: Option<i64>) -> String {
    match number {
        Some(number) => format!("{:03}", clamp_program(number)),
        None => "---".to_string(),
    }
}

/// Compact status flags, upper case when set.
pub fn status_line(bits: &StatusBits) -> String {
    let flag = |on: bool, name: &str| if on { name.to_uppercase() } else { name.to_string() };
    [
        flag(bits.ready, "ready"),
        flag(bits.run, "run"),
        flag(bits.trigger_acknowledge, "trig_ack"),
        flag(bits.trigger_error, "trig_err"),
        flag(bits.program_change_acknowledge, "pc_ack"),
        flag(bits.program_change_error, "pc_err"),
        flag(bits.new_image, "new_image"),
    ]
    .join(" ")
}

fn fields_block(device: &str, label: &str, fields: &[RenderField]) -> Vec<String> {
    let mut lines = vec![format!("[{device}] {label}")];
    lines.extend(fields.iter().map(|field| {
        format!(
            "  {:>2} {:<16} {:<6} {}",
            field.index,
            field.name,
            field.value_type,
            format_register(&field.value_type, field.value.as_ref())
        )
    }));
    lines
}
