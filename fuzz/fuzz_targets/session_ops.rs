//! Session handshake against the reference model on arbitrary operation
//! sequences.

#![no_main]

use std::time::Instant;

use camlink_core::{
    handshake::{CommandKind, LatchState},
    DetectionConfig, DeviceSession, SessionAction,
};
use camlink_harness::{ModelDevice, Operation};
use camlink_proto::{Request, SectionUpdate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelDevice::default();
    let mut session = DeviceSession::new("camA", DetectionConfig::default(), Instant::now());
    session.set_active(true);

    for op in ops {
        let expected = model.apply(op);
        let result = match op {
            Operation::Trigger => session.set_trigger(true),
            Operation::ClearTrigger => session.set_trigger(false),
            Operation::ProgramChange(value) => session.set_program_change(value),
            Operation::Reset(value) => session.set_reset(value),
            Operation::Status(bits) => {
                session.apply(SectionUpdate::Status(Operation::status_bits(bits)));
                Ok(session.detect_outputs())
            },
        };

        let sent: Vec<_> = match &result {
            Ok(actions) => actions
                .iter()
                .filter_map(|a| match a {
                    SessionAction::Send(Request::Control { control, value, .. }) => {
                        Some((*control, *value))
                    },
                    _ => None,
                })
                .collect(),
            Err(_) => Vec::new(),
        };

        assert_eq!(expected.refused, result.is_err(), "refusal diverged on {op:?}");
        assert_eq!(expected.sent, sent, "requests diverged on {op:?}");
        assert_eq!(
            model.trigger,
            session.latch(CommandKind::Trigger) == LatchState::Requested,
            "trigger latch diverged on {op:?}"
        );
    }
});
