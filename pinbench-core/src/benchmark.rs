// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark specification.
//!
//! A [`BenchmarkSpec`] is built once by the caller and only read during a
//! run; nothing in the harness mutates it.

use crate::error::ConfigurationError;
use crate::types::CoreId;

/// Default number of warmup iterations.
pub const DEFAULT_WARMUP_ITERATIONS: u64 = 100;
/// Default number of timed iterations.
pub const DEFAULT_TIMED_ITERATIONS: u64 = 1000;

/// What to run and how: counts, baseline/validation flags, optional pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkSpec {
    name: String,
    warmup_iterations: u64,
    timed_iterations: u64,
    is_baseline: bool,
    validate: bool,
    core: Option<CoreId>,
    output_size: Option<usize>,
}

impl BenchmarkSpec {
    /// Start building a spec with the default iteration counts.
    pub fn builder(name: impl Into<String>) -> BenchmarkSpecBuilder {
        BenchmarkSpecBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn warmup_iterations(&self) -> u64 {
        self.warmup_iterations
    }

    pub fn timed_iterations(&self) -> u64 {
        self.timed_iterations
    }

    pub fn is_baseline(&self) -> bool {
        self.is_baseline
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    /// Core to pin to; `None` means only signal blocking is applied.
    pub fn core(&self) -> Option<CoreId> {
        self.core
    }

    /// Declared size of the output buffer, if the benchmark produces one.
    pub fn output_size(&self) -> Option<usize> {
        self.output_size
    }
}

/// Builder for [`BenchmarkSpec`].
#[derive(Debug, Clone)]
pub struct BenchmarkSpecBuilder {
    name: String,
    warmup_iterations: u64,
    timed_iterations: u64,
    is_baseline: bool,
    validate: bool,
    core: Option<usize>,
    output_size: Option<usize>,
}

impl BenchmarkSpecBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            timed_iterations: DEFAULT_TIMED_ITERATIONS,
            is_baseline: false,
            validate: false,
            core: None,
            output_size: None,
        }
    }

    /// Set the number of warmup iterations.
    pub fn warmup(mut self, iterations: u64) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the number of timed iterations.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.timed_iterations = iterations;
        self
    }

    /// Mark this benchmark as the comparison baseline.
    pub fn baseline(mut self, is_baseline: bool) -> Self {
        self.is_baseline = is_baseline;
        self
    }

    /// Request a ground-truth comparison of the output buffer.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Pin the run to `core` with full isolation.
    pub fn pin_to(mut self, core: usize) -> Self {
        self.core = Some(core);
        self
    }

    /// Optional pin, convenient when the core comes from configuration.
    pub fn core(mut self, core: Option<usize>) -> Self {
        self.core = core;
        self
    }

    /// Declare the output buffer size the callable writes into.
    pub fn output_size(mut self, size: usize) -> Self {
        self.output_size = Some(size);
        self
    }

    pub fn build(self) -> Result<BenchmarkSpec, ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }

        // Names land verbatim in single-line export headers.
        if self.name.chars().any(char::is_control) {
            return Err(ConfigurationError::ControlCharacterInName { name: self.name });
        }

        if self.timed_iterations == 0 {
            return Err(ConfigurationError::ZeroTimedIterations { name: self.name });
        }

        let core = self.core.map(CoreId::new).transpose()?;

        Ok(BenchmarkSpec {
            name: self.name,
            warmup_iterations: self.warmup_iterations,
            timed_iterations: self.timed_iterations,
            is_baseline: self.is_baseline,
            validate: self.validate,
            core,
            output_size: self.output_size,
        })
    }
}
