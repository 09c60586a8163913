//! Status bits and cycle statistics pushed by the device.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status and handshake feedback bits.
///
/// Missing keys decode as `false`, so a peer that pushes a partial object
/// still produces a complete snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBits {
    /// Device is idle and accepts a new trigger.
    pub ready: bool,
    /// Inspection program is running.
    pub run: bool,
    /// Last trigger request completed.
    pub trigger_acknowledge: bool,
    /// Last program change request completed.
    pub program_change_acknowledge: bool,
    /// Last trigger request failed.
    pub trigger_error: bool,
    /// Last program change request failed.
    pub program_change_error: bool,
    /// A new result image is available.
    pub new_image: bool,
}

/// Run time statistics, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    /// Fastest cycle observed.
    pub min_run_time: f64,
    /// Most recent cycle.
    pub run_time: f64,
    /// Slowest cycle observed.
    pub max_run_time: f64,
}

/// One of the three statistics values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatisticsField {
    /// [`Statistics::min_run_time`].
    MinRunTime,
    /// [`Statistics::run_time`].
    RunTime,
    /// [`Statistics::max_run_time`].
    MaxRunTime,
}

impl StatisticsField {
    /// All fields in display order.
    pub const ALL: [Self; 3] = [Self::MinRunTime, Self::RunTime, Self::MaxRunTime];
}

impl fmt::Display for StatisticsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MinRunTime => "min_run_time",
            Self::RunTime => "run_time",
            Self::MaxRunTime => "max_run_time",
        })
    }
}

impl Statistics {
    /// Value of a single field.
    pub fn get(&self, field: StatisticsField) -> f64 {
        match field {
            StatisticsField::MinRunTime => self.min_run_time,
            StatisticsField::RunTime => self.run_time,
            StatisticsField::MaxRunTime => self.max_run_time,
        }
    }

    /// Fields whose value differs from `other`.
    pub fn changed_fields(&self, other: &Self) -> Vec<StatisticsField> {
        StatisticsField::ALL
            .into_iter()
            .filter(|field| self.get(*field).to_bits() != other.get(*field).to_bits())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_status_defaults_missing_bits() {
        let bits: StatusBits = serde_json::from_str(r#"{"ready":true}"#).unwrap();
        assert!(bits.ready);
        assert!(!bits.trigger_acknowledge);
        assert!(!bits.new_image);
    }

    #[test]
    fn unknown_status_keys_are_ignored() {
        let bits: StatusBits =
            serde_json::from_str(r#"{"ready":true,"future_bit":true}"#).unwrap();
        assert_eq!(bits, StatusBits { ready: true, ..Default::default() });
    }

    #[test]
    fn changed_fields_lists_only_differences() {
        let before = Statistics { min_run_time: 0.01, run_time: 0.02, max_run_time: 0.03 };
        let after = Statistics { run_time: 0.025, ..before };
        assert_eq!(after.changed_fields(&before), vec![StatisticsField::RunTime]);
        assert!(before.changed_fields(&before).is_empty());
    }
}
