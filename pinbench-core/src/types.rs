// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Small value types shared across the harness.
//!
//! Newtypes validate their invariants at creation time; the enums carry the
//! exact labels used by the console report and the raw-sample export.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Highest CPU index a `cpu_set_t` can address (`CPU_SETSIZE`).
pub const MAX_CORES: usize = 1024;

/// Validated CPU core index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct CoreId(usize);

impl CoreId {
    /// Create a new CoreId with bounds validation.
    pub fn new(core: usize) -> Result<Self, ConfigurationError> {
        if core >= MAX_CORES {
            return Err(ConfigurationError::InvalidCore {
                core,
                limit: MAX_CORES,
            });
        }
        Ok(Self(core))
    }

    /// Get the inner core index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<usize> for CoreId {
    type Error = ConfigurationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CoreId> for usize {
    fn from(core: CoreId) -> Self {
        core.0
    }
}

/// Which clock the timed loop reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Monotonic wall clock, microsecond samples.
    #[default]
    #[serde(alias = "wall_clock")]
    Wallclock,
    /// Free-running hardware cycle counter with overhead compensation.
    Cycles,
}

/// Unit attached to every latency sample of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingUnit {
    Microseconds,
    Cycles,
}

impl TimingUnit {
    /// Short suffix used in console reports.
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Microseconds => "us",
            Self::Cycles => "cycles",
        }
    }

    /// Label written to the `timing format` export header.
    pub const fn export_label(&self) -> &'static str {
        match self {
            Self::Microseconds => "microseconds",
            Self::Cycles => "cycles",
        }
    }

    /// Inverse of [`TimingUnit::export_label`].
    pub fn from_export_label(label: &str) -> Option<Self> {
        match label {
            "microseconds" => Some(Self::Microseconds),
            "cycles" => Some(Self::Cycles),
            _ => None,
        }
    }
}

impl fmt::Display for TimingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Outcome of comparing a benchmark's output against the ground truth.
///
/// `NotValidated` is distinct from both pass and fail: the benchmark never
/// asked to be checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    #[default]
    NotValidated,
}

impl ValidationStatus {
    pub fn from_outcome(matches: bool) -> Self {
        if matches {
            Self::Valid
        } else {
            Self::Invalid
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Label written to the `is valid` export header.
    pub const fn export_label(&self) -> &'static str {
        match self {
            Self::Valid => "Yes",
            Self::Invalid => "No",
            Self::NotValidated => "Not Validated",
        }
    }

    /// Inverse of [`ValidationStatus::export_label`].
    pub fn from_export_label(label: &str) -> Option<Self> {
        match label {
            "Yes" => Some(Self::Valid),
            "No" => Some(Self::Invalid),
            "Not Validated" => Some(Self::NotValidated),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.export_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_id_bounds() {
        assert_eq!(CoreId::new(3).unwrap().index(), 3);
        assert!(matches!(
            CoreId::new(MAX_CORES),
            Err(ConfigurationError::InvalidCore { .. })
        ));
    }

    #[test]
    fn test_labels_round_trip() {
        for unit in [TimingUnit::Microseconds, TimingUnit::Cycles] {
            assert_eq!(TimingUnit::from_export_label(unit.export_label()), Some(unit));
        }
        for status in [
            ValidationStatus::Valid,
            ValidationStatus::Invalid,
            ValidationStatus::NotValidated,
        ] {
            assert_eq!(
                ValidationStatus::from_export_label(status.export_label()),
                Some(status)
            );
        }
        assert_eq!(TimingUnit::from_export_label("ns"), None);
    }

    #[test]
    fn test_validation_from_outcome() {
        assert_eq!(ValidationStatus::from_outcome(true), ValidationStatus::Valid);
        assert_eq!(ValidationStatus::from_outcome(false), ValidationStatus::Invalid);
        assert!(ValidationStatus::from_outcome(false).is_invalid());
    }

    #[test]
    fn test_clock_source_yaml_names() {
        let clock: ClockSource = serde_yaml::from_str("cycles").unwrap();
        assert_eq!(clock, ClockSource::Cycles);
        let clock: ClockSource = serde_yaml::from_str("wallclock").unwrap();
        assert_eq!(clock, ClockSource::Wallclock);
    }
}
