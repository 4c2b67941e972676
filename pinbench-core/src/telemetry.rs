// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Host telemetry read around each timed loop.
//!
//! Sources (all optional, a missing one only suppresses its line):
//! - `{cpu_root}/cpuN/cpufreq/scaling_cur_freq` (kHz)
//! - thermal zone `temp` file (millidegrees Celsius)
//! - `{proc_root}/loadavg`
//! - `{proc_root}/meminfo`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::isolation::DEFAULT_CPU_ROOT;

/// Temperature at or above which a throttle warning is emitted.
pub const DEFAULT_THROTTLE_THRESHOLD_C: f64 = 70.0;
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_PROC_ROOT: &str = "/proc";

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySettings {
    pub throttle_threshold_c: f64,
    pub thermal_zone: PathBuf,
    pub cpu_root: PathBuf,
    pub proc_root: PathBuf,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            throttle_threshold_c: DEFAULT_THROTTLE_THRESHOLD_C,
            thermal_zone: PathBuf::from(DEFAULT_THERMAL_ZONE),
            cpu_root: PathBuf::from(DEFAULT_CPU_ROOT),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
        }
    }
}

/// One reading of every telemetry source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub core_count: usize,
    /// `(core, MHz)` for every core whose frequency was readable
    pub frequencies_mhz: Vec<(usize, u64)>,
    pub temperature_c: Option<f64>,
    /// 1, 5 and 15 minute load averages
    pub load_average: Option<[f64; 3]>,
    pub used_memory_kb: Option<u64>,
}

impl TelemetrySnapshot {
    /// Emit the snapshot as structured log lines tagged with `stage`.
    pub fn log(&self, stage: &'static str) {
        tracing::info!(stage, cores = self.core_count, "System status");
        for (core, mhz) in &self.frequencies_mhz {
            tracing::info!(stage, core, mhz, "CPU frequency");
        }
        if let Some(temp) = self.temperature_c {
            tracing::info!(stage, celsius = temp, "SoC temperature");
        }
        if let Some([one, five, fifteen]) = self.load_average {
            tracing::info!(stage, one, five, fifteen, "Load average");
        }
        if let Some(kb) = self.used_memory_kb {
            tracing::info!(stage, used_kb = kb, "Memory in use");
        }
    }
}

/// Result of the throttle check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermalStatus {
    Normal { temperature_c: f64 },
    Throttling { temperature_c: f64, threshold_c: f64 },
    Unknown,
}

/// Classify `temperature` against `threshold`, warning when at or above it.
pub fn thermal_status(temperature: Option<f64>, threshold: f64) -> ThermalStatus {
    match temperature {
        Some(temperature_c) if temperature_c >= threshold => {
            tracing::warn!(
                celsius = temperature_c,
                threshold = threshold,
                "Temperature at or above throttle threshold, results may be skewed"
            );
            ThermalStatus::Throttling {
                temperature_c,
                threshold_c: threshold,
            }
        }
        Some(temperature_c) => ThermalStatus::Normal { temperature_c },
        None => ThermalStatus::Unknown,
    }
}

/// Reads telemetry from (possibly relocated) sysfs and procfs roots.
#[derive(Debug, Clone, Default)]
pub struct TelemetryReader {
    settings: TelemetrySettings,
}

impl TelemetryReader {
    pub fn new(settings: TelemetrySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TelemetrySettings {
        &self.settings
    }

    /// Indices of the `cpuN` entries under the CPU root, ascending.
    ///
    /// Numbering may be sparse when cores are offline.
    pub fn core_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = std::fs::read_dir(&self.settings.cpu_root)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|entry| parse_cpu_index(&entry.file_name().to_string_lossy()))
                    .collect()
            })
            .unwrap_or_default();
        indices.sort_unstable();
        indices
    }

    /// Number of `cpuN` entries under the CPU root, falling back to sysinfo.
    pub fn core_count(&self) -> usize {
        let counted = self.core_indices().len();
        if counted > 0 {
            return counted;
        }

        let mut sys = System::new();
        sys.refresh_cpu();
        sys.cpus().len().max(1)
    }

    pub fn core_frequency_mhz(&self, core: usize) -> Option<u64> {
        let path = self
            .settings
            .cpu_root
            .join(format!("cpu{}", core))
            .join("cpufreq")
            .join("scaling_cur_freq");
        read_trimmed(&path).and_then(|s| parse_frequency_mhz(&s))
    }

    pub fn temperature_c(&self) -> Option<f64> {
        read_trimmed(&self.settings.thermal_zone).and_then(|s| parse_temperature_c(&s))
    }

    pub fn load_average(&self) -> Option<[f64; 3]> {
        read_trimmed(&self.settings.proc_root.join("loadavg")).and_then(|s| parse_loadavg(&s))
    }

    pub fn used_memory_kb(&self) -> Option<u64> {
        read_trimmed(&self.settings.proc_root.join("meminfo")).and_then(|s| parse_used_memory_kb(&s))
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            core_count: self.core_count(),
            frequencies_mhz: self
                .core_indices()
                .into_iter()
                .filter_map(|core| self.core_frequency_mhz(core).map(|mhz| (core, mhz)))
                .collect(),
            temperature_c: self.temperature_c(),
            load_average: self.load_average(),
            used_memory_kb: self.used_memory_kb(),
        }
    }

    /// Snapshot, log and throttle-check in one step.
    pub fn report(&self, stage: &'static str) -> (TelemetrySnapshot, ThermalStatus) {
        let snapshot = self.snapshot();
        snapshot.log(stage);
        let status = thermal_status(snapshot.temperature_c, self.settings.throttle_threshold_c);
        (snapshot, status)
    }
}

fn parse_cpu_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("cpu")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

/// `scaling_cur_freq` is in kHz.
pub fn parse_frequency_mhz(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().map(|khz| khz / 1000)
}

/// Thermal zones report millidegrees.
pub fn parse_temperature_c(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|milli| milli as f64 / 1000.0)
}

pub fn parse_loadavg(raw: &str) -> Option<[f64; 3]> {
    let mut fields = raw.split_whitespace().map(|f| f.parse::<f64>().ok());
    Some([fields.next()??, fields.next()??, fields.next()??])
}

/// `MemTotal - MemAvailable`, in kB.
pub fn parse_used_memory_kb(raw: &str) -> Option<u64> {
    let field = |key: &str| {
        raw.lines()
            .find_map(|line| line.strip_prefix(key))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|value| value.parse::<u64>().ok())
    };

    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    Some(total.saturating_sub(available))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16318480 kB\n\
                           MemFree:         1203400 kB\n\
                           MemAvailable:    9318480 kB\n\
                           Buffers:          402112 kB\n";

    #[test]
    fn test_parsers() {
        assert_eq!(parse_frequency_mhz("2400000\n"), Some(2400));
        assert_eq!(parse_temperature_c("48500"), Some(48.5));
        assert_eq!(parse_loadavg("0.52 0.58 0.59 1/1234 5678"), Some([0.52, 0.58, 0.59]));
        assert_eq!(parse_loadavg("0.52"), None);
        assert_eq!(parse_used_memory_kb(MEMINFO), Some(7_000_000));
        assert_eq!(parse_used_memory_kb("MemTotal: 10 kB\n"), None);
        assert_eq!(parse_frequency_mhz("<unsupported>"), None);
    }

    #[test]
    fn test_thermal_status_threshold_inclusive() {
        assert_eq!(
            thermal_status(Some(70.0), 70.0),
            ThermalStatus::Throttling {
                temperature_c: 70.0,
                threshold_c: 70.0
            }
        );
        assert_eq!(
            thermal_status(Some(69.9), 70.0),
            ThermalStatus::Normal {
                temperature_c: 69.9
            }
        );
        assert_eq!(thermal_status(None, 70.0), ThermalStatus::Unknown);
    }

    #[test]
    fn test_reader_on_fake_roots() {
        let dir = tempfile::tempdir().unwrap();
        let cpu_root = dir.path().join("cpu");
        let proc_root = dir.path().join("proc");
        for core in 0..2 {
            let freq = cpu_root.join(format!("cpu{}", core)).join("cpufreq");
            std::fs::create_dir_all(&freq).unwrap();
            std::fs::write(freq.join("scaling_cur_freq"), "1800000\n").unwrap();
        }
        // Non-core entries must not be counted.
        std::fs::create_dir_all(cpu_root.join("cpufreq")).unwrap();
        std::fs::create_dir_all(cpu_root.join("cpuidle")).unwrap();
        std::fs::create_dir_all(&proc_root).unwrap();
        std::fs::write(proc_root.join("loadavg"), "1.00 2.00 3.00 1/1 1\n").unwrap();
        let thermal = dir.path().join("temp");
        std::fs::write(&thermal, "71000\n").unwrap();

        let reader = TelemetryReader::new(TelemetrySettings {
            throttle_threshold_c: 70.0,
            thermal_zone: thermal,
            cpu_root,
            proc_root,
        });

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.core_count, 2);
        assert_eq!(snapshot.frequencies_mhz, vec![(0, 1800), (1, 1800)]);
        assert_eq!(snapshot.temperature_c, Some(71.0));
        assert_eq!(snapshot.load_average, Some([1.0, 2.0, 3.0]));
        // meminfo missing: line suppressed
        assert_eq!(snapshot.used_memory_kb, None);

        let (_, status) = reader.report("test");
        assert!(matches!(status, ThermalStatus::Throttling { .. }));
    }

    #[test]
    fn test_sparse_core_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let cpu_root = dir.path().join("cpu");
        for (core, khz) in [(0, "1200000"), (2, "2400000"), (10, "600000")] {
            let freq = cpu_root.join(format!("cpu{}", core)).join("cpufreq");
            std::fs::create_dir_all(&freq).unwrap();
            std::fs::write(freq.join("scaling_cur_freq"), khz).unwrap();
        }

        let reader = TelemetryReader::new(TelemetrySettings {
            cpu_root,
            ..TelemetrySettings::default()
        });

        assert_eq!(reader.core_indices(), vec![0, 2, 10]);
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.core_count, 3);
        assert_eq!(snapshot.frequencies_mhz, vec![(0, 1200), (2, 2400), (10, 600)]);
    }

    #[test]
    fn test_cpu_index_parsing() {
        assert_eq!(parse_cpu_index("cpu7"), Some(7));
        assert_eq!(parse_cpu_index("cpufreq"), None);
        assert_eq!(parse_cpu_index("cpu"), None);
        assert_eq!(parse_cpu_index("cpu+1"), None);
    }

    #[test]
    fn test_core_count_falls_back_to_sysinfo() {
        let dir = tempfile::tempdir().unwrap();
        let reader = TelemetryReader::new(TelemetrySettings {
            cpu_root: dir.path().join("missing"),
            ..TelemetrySettings::default()
        });
        assert!(reader.core_count() >= 1);
    }
}
