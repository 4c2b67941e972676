// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark runner: isolation, warmup, timed loop, aggregation.
//!
//! One parametrized path covers every mode (pinned or not, wall clock or
//! cycles). The per-iteration sequence is:
//!
//! ```text
//! probe.begin()  ->  fence | read clock | f() | read clock | fence  ->  probe.end()
//! ```
//!
//! so counter setup and teardown stay outside the timed region.

use crate::benchmark::BenchmarkSpec;
use crate::cache::{self, CacheProbe};
use crate::config::HarnessConfig;
use crate::error::{BenchResult, ConfigurationError};
use crate::isolation::IsolationController;
use crate::metrics::{BenchmarkResult, SampleSet};
use crate::state::{RunPhase, RunStateMachine};
use crate::telemetry::TelemetryReader;
use crate::timer::TimerBackend;
use crate::types::ValidationStatus;
use crate::validator::{self, GroundTruth};

/// Runs benchmarks one at a time on the calling thread.
///
/// Holds the session's ground truth once a baseline with an output buffer
/// has run.
pub struct Runner {
    timer: TimerBackend,
    isolation: IsolationController,
    telemetry: TelemetryReader,
    probe: Box<dyn CacheProbe>,
    ground_truth: Option<GroundTruth>,
}

impl Runner {
    /// Build a runner with the platform cache probe.
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            timer: TimerBackend::new(config.clock),
            isolation: IsolationController::new(config.isolation.clone()),
            telemetry: TelemetryReader::new(config.telemetry.clone()),
            probe: cache::platform_probe(),
            ground_truth: None,
        }
    }

    /// Replace the cache probe.
    pub fn with_cache_probe(mut self, probe: Box<dyn CacheProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn timer(&self) -> TimerBackend {
        self.timer
    }

    /// Baseline output captured so far in this session.
    pub fn ground_truth(&self) -> Option<&GroundTruth> {
        self.ground_truth.as_ref()
    }

    /// Run a benchmark whose callable produces no output buffer.
    ///
    /// A `validate` flag has nothing to compare here, so the result stays
    /// `NotValidated`.
    pub fn run<F, T>(&mut self, spec: &BenchmarkSpec, mut f: F) -> BenchResult<BenchmarkResult>
    where
        F: FnMut() -> T,
    {
        let mut result = self.execute(spec, &mut f)?;
        if spec.is_baseline() && spec.validate() {
            result.validation = ValidationStatus::Valid;
        }
        Ok(result)
    }

    /// Run a benchmark that writes into `output`.
    ///
    /// The baseline's final output becomes the session ground truth; other
    /// benchmarks with `validate` set are compared against it. The buffer is
    /// zeroed afterwards either way.
    pub fn run_with_output<F, T>(
        &mut self,
        spec: &BenchmarkSpec,
        output: &mut [u8],
        mut f: F,
    ) -> BenchResult<BenchmarkResult>
    where
        F: FnMut(&mut [u8]) -> T,
    {
        if let Some(expected) = spec.output_size() {
            if expected != output.len() {
                return Err(ConfigurationError::OutputSizeMismatch {
                    name: spec.name().to_string(),
                    expected,
                    actual: output.len(),
                }
                .into());
            }
        }

        let mut result = self.execute(spec, &mut || f(&mut *output))?;

        if spec.is_baseline() {
            let truth = GroundTruth::capture(output);
            tracing::debug!(
                benchmark = spec.name(),
                bytes = truth.len(),
                crc = truth.checksum(),
                "Captured ground truth"
            );
            self.ground_truth = Some(truth);
            if spec.validate() {
                result.validation = ValidationStatus::Valid;
            }
        } else if spec.validate() {
            result.validation = validator::validate(spec.name(), output, self.ground_truth.as_ref());
        }

        output.fill(0);
        Ok(result)
    }

    fn execute<F, T>(&mut self, spec: &BenchmarkSpec, f: &mut F) -> BenchResult<BenchmarkResult>
    where
        F: FnMut() -> T,
    {
        let mut phases = RunStateMachine::new(spec.name());

        tracing::info!(
            benchmark = spec.name(),
            warmup = spec.warmup_iterations(),
            iterations = spec.timed_iterations(),
            core = ?spec.core().map(|c| c.index()),
            unit = %self.timer.unit(),
            "Running benchmark"
        );

        let guard = self.isolation.acquire(spec.core());
        if spec.core().is_some() {
            phases.transition_to(RunPhase::Isolated)?;
        }

        self.telemetry.report("before");

        phases.transition_to(RunPhase::WarmingUp)?;
        for _ in 0..spec.warmup_iterations() {
            std::hint::black_box(f());
        }

        phases.transition_to(RunPhase::Measuring)?;
        let samples = self.measure(spec, f);

        self.telemetry.report("after");
        guard.release();

        phases.transition_to(RunPhase::Aggregated)?;
        let result = BenchmarkResult::from_samples(spec, self.timer.unit(), samples);

        phases.transition_to(RunPhase::Reported)?;
        tracing::info!(
            benchmark = spec.name(),
            median = result.median(),
            unit = %result.unit,
            "Benchmark complete"
        );

        phases.transition_to(RunPhase::Released)?;
        Ok(result)
    }

    fn measure<F, T>(&mut self, spec: &BenchmarkSpec, f: &mut F) -> SampleSet
    where
        F: FnMut() -> T,
    {
        let iterations = spec.timed_iterations() as usize;
        let mut samples = SampleSet::with_len(iterations);
        let mut counters = true;

        for index in 0..iterations {
            if counters {
                if let Err(e) = self.probe.begin() {
                    tracing::warn!(
                        benchmark = spec.name(),
                        error = %e,
                        "Cache counters unavailable, miss rates not measured"
                    );
                    counters = false;
                }
            }

            let latency = self.timer.measure(&mut *f);

            let miss_rate = if counters {
                match self.probe.end() {
                    Ok(reading) => reading.miss_rate(),
                    Err(e) => {
                        tracing::warn!(
                            benchmark = spec.name(),
                            error = %e,
                            "Cache counter read failed, miss rates not measured"
                        );
                        counters = false;
                        0.0
                    }
                }
            } else {
                0.0
            };

            samples.record(index, latency, miss_rate);
        }

        if !counters {
            samples.discard_miss_rates();
        }
        samples
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("timer", &self.timer)
            .field("isolation", &self.isolation)
            .field("ground_truth", &self.ground_truth.as_ref().map(|t| t.len()))
            .finish()
    }
}
