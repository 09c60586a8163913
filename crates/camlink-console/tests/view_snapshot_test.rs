//! Snapshot tests for console rendering.

use camlink_console::view;
use camlink_core::{ViewUpdate, snapshot::render_fields};
use camlink_proto::{RegisterValue, StatisticsField, StatusBits, Variable};

#[test]
fn output_fields_block() {
    let variables = vec![
        Some(Variable::new("score", "float")),
        None,
        Some(Variable::new("label", "string")),
        Some(Variable::new("count", "int")),
    ];
    let registers = vec![
        RegisterValue::Float(0.87654),
        RegisterValue::Int(99),
        RegisterValue::Text("ok".into()),
    ];
    let update = ViewUpdate::OutputFields(render_fields(&variables, &registers));

    insta::assert_snapshot!(view::render("camA", &update).join("\n"), @r"
    [camA] outputs
       0 score            float  0.88
       2 label            string ok
       3 count            int    -
    ");
}

#[test]
fn status_and_statistics_lines() {
    let status = ViewUpdate::Status(StatusBits {
        ready: true,
        run: true,
        new_image: true,
        ..StatusBits::default()
    });
    insta::assert_snapshot!(
        view::render("camB", &status).join("\n"),
        @"[camB] status READY RUN trig_ack trig_err pc_ack pc_err NEW_IMAGE"
    );

    let statistic = ViewUpdate::Statistic { field: StatisticsField::MaxRunTime, seconds: 0.04567 };
    insta::assert_snapshot!(
        view::render("camB", &statistic).join("\n"),
        @"[camB] max_run_time 45.67 ms"
    );

    insta::assert_snapshot!(
        view::render("camB", &ViewUpdate::ProgramNumber(Some(42))).join("\n"),
        @"[camB] program 042"
    );
}
