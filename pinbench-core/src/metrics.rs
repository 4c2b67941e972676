// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Result types produced by a run.
//!
//! A [`SampleSet`] is filled by the timed loop, then moved into the
//! [`BenchmarkResult`] that aggregates it. [`SuiteReport`] wraps a whole
//! comparison set with host metadata for JSON output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use crate::benchmark::BenchmarkSpec;
use crate::error::ConfigurationError;
use crate::stats::{self, Stats};
use crate::types::{TimingUnit, ValidationStatus};

/// Per-iteration samples: latency and L1D miss rate, indexed by iteration.
///
/// Both sequences always have the same length, fixed at allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    latencies: Vec<u64>,
    miss_rates: Vec<f64>,
    miss_rates_measured: bool,
}

impl SampleSet {
    /// Allocate a zeroed sample set for `len` timed iterations.
    pub fn with_len(len: usize) -> Self {
        Self {
            latencies: vec![0; len],
            miss_rates: vec![0.0; len],
            miss_rates_measured: true,
        }
    }

    /// Build a sample set from two parallel sequences.
    pub fn from_parts(
        latencies: Vec<u64>,
        miss_rates: Vec<f64>,
        miss_rates_measured: bool,
    ) -> Result<Self, ConfigurationError> {
        if latencies.len() != miss_rates.len() {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "miss_rates",
                value: miss_rates.len().to_string(),
                reason: format!("expected {} entries to match latencies", latencies.len()),
            });
        }
        Ok(Self {
            latencies,
            miss_rates,
            miss_rates_measured,
        })
    }

    /// Store one iteration's sample. The miss rate is clamped to [0, 100].
    #[inline]
    pub fn record(&mut self, index: usize, latency: u64, miss_rate: f64) {
        self.latencies[index] = latency;
        self.miss_rates[index] = miss_rate.clamp(0.0, 100.0);
    }

    /// Mark the miss-rate column as not measured and zero it.
    pub fn discard_miss_rates(&mut self) {
        self.miss_rates.iter_mut().for_each(|rate| *rate = 0.0);
        self.miss_rates_measured = false;
    }

    pub fn len(&self) -> usize {
        self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latencies.is_empty()
    }

    pub fn latencies(&self) -> &[u64] {
        &self.latencies
    }

    pub fn miss_rates(&self) -> &[f64] {
        &self.miss_rates
    }

    pub fn miss_rates_measured(&self) -> bool {
        self.miss_rates_measured
    }

    /// `(latency, miss_rate)` pairs in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.latencies
            .iter()
            .copied()
            .zip(self.miss_rates.iter().copied())
    }
}

/// Aggregated outcome of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Name of the benchmark
    pub name: String,
    /// Whether this benchmark is the comparison baseline
    pub is_baseline: bool,
    /// Unmeasured iterations run before timing
    pub warmup_iterations: u64,
    /// Measured iterations
    pub timed_iterations: u64,
    /// Unit of every latency value
    pub unit: TimingUnit,
    /// Ground-truth comparison outcome
    pub validation: ValidationStatus,
    /// Latency statistics
    pub latency: Stats,
    /// L1D miss-rate statistics in percent; `None` when counters were unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_miss_rate: Option<Stats>,
    /// Raw samples (dropped from JSON reports unless requested)
    #[serde(default, skip_serializing_if = "SampleSet::is_empty")]
    pub samples: SampleSet,
}

impl BenchmarkResult {
    /// Aggregate a filled sample set into a result.
    pub fn from_samples(spec: &BenchmarkSpec, unit: TimingUnit, samples: SampleSet) -> Self {
        let (latency, miss_rate) = stats::aggregate(&samples);

        Self {
            name: spec.name().to_string(),
            is_baseline: spec.is_baseline(),
            warmup_iterations: spec.warmup_iterations(),
            timed_iterations: spec.timed_iterations(),
            unit,
            validation: ValidationStatus::NotValidated,
            latency,
            cache_miss_rate: samples.miss_rates_measured().then_some(miss_rate),
            samples,
        }
    }

    /// Median latency, the ranking key.
    pub fn median(&self) -> f64 {
        self.latency.median
    }
}

/// System information captured at report time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// OS version
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of logical CPUs
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// A whole comparison set with host metadata, for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite identifier
    pub benchmark_suite: String,
    /// Harness version
    pub version: String,
    /// Unique id of this report
    pub run_id: Uuid,
    /// Timestamp when the report was assembled
    pub timestamp: DateTime<Utc>,
    /// Host information
    pub system_info: SystemInfo,
    /// Results in registration order
    pub results: Vec<BenchmarkResult>,
}

impl SuiteReport {
    /// Assemble a report from results. Raw samples are dropped unless `keep_raw_samples`.
    ///
    /// Results loaded back from a stripped report cannot be re-exported to CSV.
    pub fn new(results: &[BenchmarkResult], keep_raw_samples: bool) -> Self {
        let results = results
            .iter()
            .cloned()
            .map(|mut result| {
                if !keep_raw_samples {
                    result.samples = SampleSet::default();
                }
                result
            })
            .collect();

        Self {
            benchmark_suite: "pinbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            results,
        }
    }
}
