// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Caller-owned comparison set.
//!
//! A [`Suite`] keeps results in registration order together with the
//! runner that holds the session's ground truth. Independent suites share
//! nothing and may live side by side.

use std::path::{Path, PathBuf};

use crate::benchmark::BenchmarkSpec;
use crate::error::{BenchResult, ConfigurationError};
use crate::export;
use crate::harness::Runner;
use crate::metrics::{BenchmarkResult, SuiteReport};
use crate::summary::{self, Ranking};
use crate::validator::GroundTruth;

#[derive(Debug)]
pub struct Suite {
    runner: Runner,
    results: Vec<BenchmarkResult>,
}

impl Suite {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner,
            results: Vec::new(),
        }
    }

    /// Run a benchmark and register its result.
    pub fn run<F, T>(&mut self, spec: &BenchmarkSpec, f: F) -> BenchResult<&BenchmarkResult>
    where
        F: FnMut() -> T,
    {
        let result = self.runner.run(spec, f)?;
        Ok(self.register(result))
    }

    /// Run a benchmark writing into `output` and register its result.
    ///
    /// Run the baseline first so later benchmarks have a ground truth.
    pub fn run_with_output<F, T>(
        &mut self,
        spec: &BenchmarkSpec,
        output: &mut [u8],
        f: F,
    ) -> BenchResult<&BenchmarkResult>
    where
        F: FnMut(&mut [u8]) -> T,
    {
        let result = self.runner.run_with_output(spec, output, f)?;
        Ok(self.register(result))
    }

    /// Register a result produced elsewhere.
    pub fn push(&mut self, result: BenchmarkResult) {
        self.results.push(result);
    }

    fn register(&mut self, result: BenchmarkResult) -> &BenchmarkResult {
        let index = self.results.len();
        self.results.push(result);
        &self.results[index]
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    pub fn ground_truth(&self) -> Option<&GroundTruth> {
        self.runner.ground_truth()
    }

    pub fn rank(&self, include_invalid: bool) -> Result<Ranking, ConfigurationError> {
        summary::rank(&self.results, include_invalid)
    }

    /// Write every result's raw samples into `dir`.
    pub fn export(&self, dir: impl AsRef<Path>) -> BenchResult<Vec<PathBuf>> {
        export::export(&self.results, dir)
    }

    /// JSON-ready report with host metadata.
    pub fn report(&self, keep_raw_samples: bool) -> SuiteReport {
        SuiteReport::new(&self.results, keep_raw_samples)
    }

    pub fn into_results(self) -> Vec<BenchmarkResult> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::UnsupportedCacheProbe;
    use crate::config::HarnessConfig;
    use crate::types::ValidationStatus;

    fn suite() -> Suite {
        Suite::new(
            Runner::new(&HarnessConfig::default()).with_cache_probe(Box::new(UnsupportedCacheProbe)),
        )
    }

    fn spec(name: &str) -> crate::benchmark::BenchmarkSpecBuilder {
        BenchmarkSpec::builder(name).warmup(1).iterations(5)
    }

    #[test]
    fn test_results_kept_in_registration_order() {
        let mut suite = suite();
        suite.run(&spec("first").baseline(true).build().unwrap(), || 1).unwrap();
        suite.run(&spec("second").build().unwrap(), || 2).unwrap();

        let names: Vec<&str> = suite.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(suite.rank(false).unwrap().entries.len(), 2);
    }

    #[test]
    fn test_validated_pair() {
        let mut suite = suite();
        let mut buf = [0u8; 16];

        suite
            .run_with_output(
                &spec("fill").baseline(true).validate(true).build().unwrap(),
                &mut buf,
                |out| out.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8),
            )
            .unwrap();
        assert_eq!(suite.ground_truth().map(|t| t.len()), Some(16));

        let status = suite
            .run_with_output(&spec("broken").validate(true).build().unwrap(), &mut buf, |out| {
                out.fill(1)
            })
            .unwrap()
            .validation;
        assert_eq!(status, ValidationStatus::Invalid);

        assert_eq!(suite.rank(false).unwrap().entries.len(), 1);
        assert_eq!(suite.rank(true).unwrap().entries.len(), 2);
    }

    #[test]
    fn test_rank_without_baseline_fails() {
        let mut suite = suite();
        suite.run(&spec("lonely").build().unwrap(), || ()).unwrap();
        assert_eq!(suite.rank(false), Err(ConfigurationError::MissingBaseline));
    }
}
