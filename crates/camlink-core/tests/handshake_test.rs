//! Handshake behaviour through the full inbound path.
//!
//! Peer frames go through the router into the registry, detection runs on
//! registry ticks, and the outbound requests are checked on the wire.

use std::time::{Duration, Instant};

use camlink_core::{
    DetectionConfig, DeviceAction, OperatorCommand, Registry, SessionAction,
    router::{self, DispatchOutcome},
    snapshot::FieldGroup,
};
use camlink_proto::{Message, Request, StatusBits};
use proptest::prelude::*;

const PERIOD: Duration = Duration::from_millis(10);

struct Bench {
    registry: Registry,
    now: Instant,
}

impl Bench {
    fn new() -> Self {
        let now = Instant::now();
        let mut bench = Self { registry: Registry::new(DetectionConfig::default()), now };
        bench.frame(r#"{"peripheral":"manager","type":"response","data":["camA","camB"]}"#);
        bench
    }

    fn frame(&mut self, text: &str) -> DispatchOutcome {
        let message = Message::parse(text).unwrap();
        router::dispatch(&mut self.registry, message, self.now).0
    }

    fn status(&mut self, device: &str, bits: StatusBits) {
        let value = serde_json::to_value(bits).unwrap();
        let text = serde_json::json!({
            "peripheral": device,
            "type": "status",
            "section": "status",
            "value": value,
        })
        .to_string();
        self.frame(&text);
    }

    fn tick(&mut self) -> Vec<DeviceAction> {
        self.now += PERIOD;
        self.registry.tick(self.now)
    }

    fn command(&mut self, command: OperatorCommand) -> Vec<DeviceAction> {
        self.registry.apply(command, self.now).unwrap()
    }
}

fn wire(actions: &[DeviceAction]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|a| match &a.action {
            SessionAction::Send(request) => Some(request.encode().unwrap()),
            _ => None,
        })
        .collect()
}

fn changes(actions: &[DeviceAction], group: FieldGroup) -> usize {
    actions.iter().filter(|a| a.action == SessionAction::Changed(group)).count()
}

#[test]
fn bootstrap_activates_first_listed_device() {
    let bench = Bench::new();
    assert_eq!(bench.registry.devices(), ["camA", "camB"]);
    assert_eq!(bench.registry.active(), Some("camA"));
}

#[test]
fn acknowledge_edge_sends_one_clear() {
    let mut bench = Bench::new();
    let sent = wire(&bench.command(OperatorCommand::Trigger));
    assert_eq!(sent, vec![r#"{"peripheral":"camA","type":"request","section":"control","data":"trigger","value":"true"}"#]);

    bench.status("camA", StatusBits { trigger_acknowledge: true, ..Default::default() });
    let sent = wire(&bench.tick());
    assert_eq!(sent, vec![r#"{"peripheral":"camA","type":"request","section":"control","data":"trigger","value":"false"}"#]);
    assert!(!bench.registry.session("camA").unwrap().inputs().trigger);

    // Same status again: no edge, nothing sent.
    bench.status("camA", StatusBits { trigger_acknowledge: true, ..Default::default() });
    assert!(wire(&bench.tick()).is_empty());
}

#[test]
fn error_edge_clears_like_acknowledge() {
    let mut bench = Bench::new();
    bench.command(OperatorCommand::Trigger);

    bench.status("camA", StatusBits { trigger_error: true, ..Default::default() });
    let sent = wire(&bench.tick());

    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains(r#""data":"trigger","value":"false""#));
}

#[test]
fn held_acknowledge_blocks_trigger() {
    let mut bench = Bench::new();
    bench.status("camA", StatusBits { trigger_acknowledge: true, ..Default::default() });
    bench.tick();

    assert!(bench.registry.apply(OperatorCommand::Trigger, bench.now).is_err());

    // Already-true acknowledge reasserted: no clear either.
    bench.status("camA", StatusBits { trigger_acknowledge: true, ready: true, ..Default::default() });
    assert!(wire(&bench.tick()).is_empty());
}

#[test]
fn inactive_device_is_cleared_but_not_displayed() {
    let mut bench = Bench::new();
    bench.command(OperatorCommand::Select("camB".into()));
    bench.command(OperatorCommand::ProgramChange(true));
    bench.command(OperatorCommand::Select("camA".into()));

    bench.status("camB", StatusBits { program_change_acknowledge: true, ..Default::default() });
    let actions = bench.tick();

    let sent = wire(&actions);
    assert_eq!(sent, vec![r#"{"peripheral":"camB","type":"request","section":"control","data":"program_change","value":"false"}"#]);
    assert!(actions.iter().all(|a| a.device != "camB" || !matches!(a.action, SessionAction::View(_))));
}

#[test]
fn program_helper_sends_number_then_latch() {
    let mut bench = Bench::new();
    let mut actions = bench.command(OperatorCommand::ProgramNumber(7));
    actions.extend(bench.command(OperatorCommand::ProgramChange(true)));

    assert_eq!(
        wire(&actions),
        vec![
            r#"{"peripheral":"camA","type":"request","section":"program_number","value":"7"}"#.to_string(),
            r#"{"peripheral":"camA","type":"request","section":"control","data":"program_change","value":"true"}"#.to_string(),
        ]
    );
}

#[test]
fn continuous_trigger_rearms_once_per_image() {
    let mut bench = Bench::new();
    let first = wire(&bench.command(OperatorCommand::ContinuousTrigger(true)));
    assert_eq!(first.len(), 1);

    // Acknowledge and image done, device busy.
    bench.status(
        "camA",
        StatusBits { trigger_acknowledge: true, new_image: true, ..Default::default() },
    );
    let mut sent = wire(&bench.tick());
    for _ in 0..5 {
        sent.extend(wire(&bench.tick()));
    }
    assert_eq!(sent.len(), 1, "only the clear: {sent:?}");

    bench.status("camA", StatusBits { new_image: true, ready: true, ..Default::default() });
    let mut sent = Vec::new();
    for _ in 0..20 {
        sent.extend(wire(&bench.tick()));
    }
    assert_eq!(sent, vec![r#"{"peripheral":"camA","type":"request","section":"control","data":"trigger","value":"true"}"#]);
    assert!(!bench.registry.is_rearm_armed("camA"));
}

#[test]
fn sends_survive_unknown_frames() {
    let mut bench = Bench::new();
    let outcome = bench.frame(r#"{"peripheral":"camA","type":"status","section":"lighting","value":[1,2]}"#);
    assert!(matches!(outcome, DispatchOutcome::Ignored { .. }));
    assert_eq!(wire(&bench.command(OperatorCommand::Reset(true))).len(), 1);
}

fn status_bits() -> impl Strategy<Value = StatusBits> {
    prop::array::uniform7(any::<bool>()).prop_map(|b| StatusBits {
        ready: b[0],
        run: b[1],
        trigger_acknowledge: b[2],
        program_change_acknowledge: b[3],
        trigger_error: b[4],
        program_change_error: b[5],
        new_image: b[6],
    })
}

proptest! {
    #[test]
    fn same_snapshot_twice_reports_once(bits in status_bits()) {
        let mut bench = Bench::new();
        let mut reported = 0;

        bench.status("camA", bits);
        reported += changes(&bench.tick(), FieldGroup::Status);
        bench.status("camA", bits);
        reported += changes(&bench.tick(), FieldGroup::Status);

        let expected = usize::from(bits != StatusBits::default());
        prop_assert_eq!(reported, expected);
    }

    #[test]
    fn trigger_clears_at_most_once_per_edge(sequence in prop::collection::vec(status_bits(), 1..20)) {
        let mut bench = Bench::new();
        let mut previous = StatusBits::default();
        bench.registry.apply(OperatorCommand::Trigger, bench.now).ok();

        for bits in sequence {
            let requested = bench.registry.session("camA").unwrap().inputs().trigger;
            bench.status("camA", bits);
            let clears = wire(&bench.tick())
                .into_iter()
                .filter(|w| w.contains(r#""data":"trigger","value":"false""#))
                .count();

            let edge = (!previous.trigger_acknowledge && bits.trigger_acknowledge)
                || (!previous.trigger_error && bits.trigger_error);
            prop_assert_eq!(clears, usize::from(requested && edge));
            previous = bits;

            bench.registry.apply(OperatorCommand::Trigger, bench.now).ok();
        }
    }
}

#[test]
fn request_device_matches_action_device() {
    let mut bench = Bench::new();
    for action in bench.command(OperatorCommand::Trigger) {
        if let SessionAction::Send(request) = &action.action {
            assert_eq!(request.device(), Some(action.device.as_str()));
            assert_ne!(request, &Request::Announce);
        }
    }
}
