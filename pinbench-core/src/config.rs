// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML harness configuration with strict schema validation.
//!
//! Every section is optional and falls back to the built-in defaults; an
//! unknown key or an out-of-range value is rejected before any benchmark
//! runs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::benchmark::{
    BenchmarkSpec, BenchmarkSpecBuilder, DEFAULT_TIMED_ITERATIONS, DEFAULT_WARMUP_ITERATIONS,
};
use crate::error::{BenchError, BenchResult, ConfigurationError};
use crate::isolation::{
    IsolationSettings, DEFAULT_CPU_ROOT, DEFAULT_DMA_LATENCY_PATH, DEFAULT_SETTLE_SPINS,
};
use crate::telemetry::{
    TelemetrySettings, DEFAULT_PROC_ROOT, DEFAULT_THERMAL_ZONE, DEFAULT_THROTTLE_THRESHOLD_C,
};
use crate::types::{ClockSource, CoreId};

/// Default directory for raw-sample exports.
pub const DEFAULT_EXPORT_DIR: &str = "data";

/// Hottest plausible throttle threshold.
const MAX_THROTTLE_THRESHOLD_C: f64 = 150.0;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIterations {
    #[serde(default = "default_warmup")]
    warmup: u64,
    #[serde(default = "default_timed")]
    timed: u64,
}

fn default_warmup() -> u64 {
    DEFAULT_WARMUP_ITERATIONS
}

fn default_timed() -> u64 {
    DEFAULT_TIMED_ITERATIONS
}

impl Default for RawIterations {
    fn default() -> Self {
        Self {
            warmup: default_warmup(),
            timed: default_timed(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIsolation {
    #[serde(default = "default_performance_governor")]
    performance_governor: String,
    #[serde(default = "default_restore_governor")]
    restore_governor: String,
    #[serde(default = "default_settle_spins")]
    settle_spins: u64,
    #[serde(default)]
    hold_dma_latency: bool,
    #[serde(default = "default_cpu_root")]
    cpu_root: String,
    #[serde(default = "default_dma_latency_path")]
    dma_latency_path: String,
}

fn default_performance_governor() -> String {
    "performance".to_string()
}

fn default_restore_governor() -> String {
    "ondemand".to_string()
}

fn default_settle_spins() -> u64 {
    DEFAULT_SETTLE_SPINS
}

fn default_cpu_root() -> String {
    DEFAULT_CPU_ROOT.to_string()
}

fn default_dma_latency_path() -> String {
    DEFAULT_DMA_LATENCY_PATH.to_string()
}

impl Default for RawIsolation {
    fn default() -> Self {
        Self {
            performance_governor: default_performance_governor(),
            restore_governor: default_restore_governor(),
            settle_spins: default_settle_spins(),
            hold_dma_latency: false,
            cpu_root: default_cpu_root(),
            dma_latency_path: default_dma_latency_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTelemetry {
    #[serde(default = "default_throttle_threshold")]
    throttle_threshold_c: f64,
    #[serde(default = "default_thermal_zone")]
    thermal_zone: String,
    #[serde(default = "default_proc_root")]
    proc_root: String,
}

fn default_throttle_threshold() -> f64 {
    DEFAULT_THROTTLE_THRESHOLD_C
}

fn default_thermal_zone() -> String {
    DEFAULT_THERMAL_ZONE.to_string()
}

fn default_proc_root() -> String {
    DEFAULT_PROC_ROOT.to_string()
}

impl Default for RawTelemetry {
    fn default() -> Self {
        Self {
            throttle_threshold_c: default_throttle_threshold(),
            thermal_zone: default_thermal_zone(),
            proc_root: default_proc_root(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReporting {
    #[serde(default)]
    include_invalid: bool,
    #[serde(default = "default_export_dir")]
    export_dir: String,
    #[serde(default)]
    json: bool,
    #[serde(default)]
    keep_raw_samples: bool,
}

fn default_export_dir() -> String {
    DEFAULT_EXPORT_DIR.to_string()
}

impl Default for RawReporting {
    fn default() -> Self {
        Self {
            include_invalid: false,
            export_dir: default_export_dir(),
            json: false,
            keep_raw_samples: false,
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    iterations: RawIterations,
    #[serde(default)]
    clock: ClockSource,
    #[serde(default)]
    core: Option<usize>,
    #[serde(default)]
    isolation: RawIsolation,
    #[serde(default)]
    telemetry: RawTelemetry,
    #[serde(default)]
    reporting: RawReporting,
}

/// Reporting and export options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingConfig {
    /// Rank benchmarks whose validation failed
    pub include_invalid: bool,
    pub export_dir: PathBuf,
    /// Also write a JSON suite report
    pub json: bool,
    /// Keep raw samples in the JSON report
    pub keep_raw_samples: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            include_invalid: false,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            json: false,
            keep_raw_samples: false,
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub warmup_iterations: u64,
    pub timed_iterations: u64,
    pub clock: ClockSource,
    /// Default target core for specs built through [`HarnessConfig::spec`]
    pub core: Option<CoreId>,
    pub isolation: IsolationSettings,
    pub telemetry: TelemetrySettings,
    pub reporting: ReportingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            timed_iterations: DEFAULT_TIMED_ITERATIONS,
            clock: ClockSource::default(),
            core: None,
            isolation: IsolationSettings::default(),
            telemetry: TelemetrySettings::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Spec builder seeded with the configured iteration counts and core.
    pub fn spec(&self, name: impl Into<String>) -> BenchmarkSpecBuilder {
        BenchmarkSpec::builder(name)
            .warmup(self.warmup_iterations)
            .iterations(self.timed_iterations)
            .core(self.core.map(|core| core.index()))
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<HarnessConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<HarnessConfig> {
        // An empty document means "all defaults".
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Ok(Self::validate(raw)?)
    }

    fn validate(raw: RawConfig) -> Result<HarnessConfig, ConfigurationError> {
        if raw.iterations.timed == 0 {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "iterations.timed",
                value: "0".to_string(),
                reason: "At least one timed iteration is required".to_string(),
            });
        }

        let core = raw.core.map(CoreId::new).transpose()?;
        let isolation = Self::validate_isolation(raw.isolation)?;
        let telemetry = Self::validate_telemetry(raw.telemetry, &isolation.cpu_root)?;

        Ok(HarnessConfig {
            warmup_iterations: raw.iterations.warmup,
            timed_iterations: raw.iterations.timed,
            clock: raw.clock,
            core,
            isolation,
            telemetry,
            reporting: Self::validate_reporting(raw.reporting)?,
        })
    }

    fn validate_isolation(raw: RawIsolation) -> Result<IsolationSettings, ConfigurationError> {
        non_empty("isolation.performance_governor", &raw.performance_governor)?;
        non_empty("isolation.restore_governor", &raw.restore_governor)?;
        non_empty("isolation.cpu_root", &raw.cpu_root)?;
        non_empty("isolation.dma_latency_path", &raw.dma_latency_path)?;

        Ok(IsolationSettings {
            performance_governor: raw.performance_governor.trim().to_string(),
            restore_governor: raw.restore_governor.trim().to_string(),
            settle_spins: raw.settle_spins,
            hold_dma_latency: raw.hold_dma_latency,
            cpu_root: PathBuf::from(raw.cpu_root),
            dma_latency_path: PathBuf::from(raw.dma_latency_path),
        })
    }

    /// Frequency telemetry reads from the same sysfs root as the governor.
    fn validate_telemetry(
        raw: RawTelemetry,
        cpu_root: &Path,
    ) -> Result<TelemetrySettings, ConfigurationError> {
        let threshold = raw.throttle_threshold_c;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > MAX_THROTTLE_THRESHOLD_C {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "telemetry.throttle_threshold_c",
                value: threshold.to_string(),
                reason: format!("Must be above 0 and at most {}", MAX_THROTTLE_THRESHOLD_C),
            });
        }

        non_empty("telemetry.thermal_zone", &raw.thermal_zone)?;
        non_empty("telemetry.proc_root", &raw.proc_root)?;

        Ok(TelemetrySettings {
            throttle_threshold_c: threshold,
            thermal_zone: PathBuf::from(raw.thermal_zone),
            cpu_root: cpu_root.to_path_buf(),
            proc_root: PathBuf::from(raw.proc_root),
        })
    }

    fn validate_reporting(raw: RawReporting) -> Result<ReportingConfig, ConfigurationError> {
        non_empty("reporting.export_dir", &raw.export_dir)?;

        Ok(ReportingConfig {
            include_invalid: raw.include_invalid,
            export_dir: PathBuf::from(raw.export_dir),
            json: raw.json,
            keep_raw_samples: raw.keep_raw_samples,
        })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::InvalidFieldValue {
            field,
            value: value.to_string(),
            reason: "Cannot be empty".to_string(),
        });
    }
    Ok(())
}
