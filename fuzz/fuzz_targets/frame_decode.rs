//! Inbound frame decoding must never panic, whatever the peer sends.
//!
//! Every text that parses is also routed through a registry to exercise
//! session creation and snapshot storage on hostile payloads.

#![no_main]

use std::time::{Duration, Instant};

use camlink_core::{router, DetectionConfig, Registry};
use camlink_proto::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let now = Instant::now();
    let mut registry = Registry::new(DetectionConfig::default());
    registry.bootstrap(&["camA".to_string()], now);

    if let Ok(message) = Message::parse(text) {
        let _ = router::dispatch(&mut registry, message, now);
        let _ = registry.tick(now + Duration::from_millis(10));
    }
});
