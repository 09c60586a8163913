//! Continuous trigger re-arm polls.
//!
//! After a new image in continuous mode, the device must report ready before
//! the next trigger is sent. Each waiting device gets one short-lived poll,
//! keyed by device id. Arming again replaces the existing poll instead of
//! adding a second one.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use camlink_proto::DeviceId;

/// Scheduled re-arm polls.
#[derive(Debug, Clone)]
pub struct RearmScheduler {
    period: Duration,
    polls: BTreeMap<DeviceId, Instant>,
}

impl RearmScheduler {
    /// Scheduler polling every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period, polls: BTreeMap::new() }
    }

    /// Start (or restart) the poll for `device`. First check is one period out.
    pub fn arm(&mut self, device: &str, now: Instant) {
        self.polls.insert(device.to_string(), now + self.period);
    }

    /// Cancel the poll for `device`. Returns whether one was running.
    pub fn cancel(&mut self, device: &str) -> bool {
        self.polls.remove(device).is_some()
    }

    /// Whether a poll is running for `device`.
    pub fn is_armed(&self, device: &str) -> bool {
        self.polls.contains_key(device)
    }

    /// Number of running polls.
    pub fn len(&self) -> usize {
        self.polls.len()
    }

    /// Whether no poll is running.
    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    /// Devices whose poll is due at `now`.
    ///
    /// Due polls are rescheduled one period later. The caller cancels the
    /// ones whose check succeeded.
    pub fn due(&mut self, now: Instant) -> Vec<DeviceId> {
        let mut due = Vec::new();
        for (device, next) in &mut self.polls {
            if now >= *next {
                *next = now + self.period;
                due.push(device.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_fires_each_period_until_canceled() {
        let t0 = Instant::now();
        let period = Duration::from_millis(10);
        let mut scheduler = RearmScheduler::new(period);

        scheduler.arm("camA", t0);
        assert!(scheduler.due(t0).is_empty());
        assert_eq!(scheduler.due(t0 + period), vec!["camA".to_string()]);
        assert!(scheduler.due(t0 + period).is_empty());
        assert_eq!(scheduler.due(t0 + period * 2), vec!["camA".to_string()]);

        assert!(scheduler.cancel("camA"));
        assert!(!scheduler.cancel("camA"));
        assert!(scheduler.due(t0 + period * 10).is_empty());
    }

    #[test]
    fn rearming_replaces_existing_poll() {
        let t0 = Instant::now();
        let mut scheduler = RearmScheduler::new(Duration::from_millis(10));

        scheduler.arm("camA", t0);
        scheduler.arm("camA", t0 + Duration::from_millis(5));
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.due(t0 + Duration::from_millis(10)).is_empty());
        assert_eq!(scheduler.due(t0 + Duration::from_millis(15)).len(), 1);
    }
}
