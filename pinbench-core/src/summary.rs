// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Baseline-relative ranking and console rendering.

use std::fmt;

use serde::Serialize;

use crate::error::ConfigurationError;
use crate::metrics::BenchmarkResult;
use crate::types::{TimingUnit, ValidationStatus};

const RULE: &str = "========================================";

/// One line of the comparative summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub median: f64,
    pub unit: TimingUnit,
    /// `median / baseline median`; exactly 1.0 for the baseline itself
    pub relative_performance: f64,
    /// `1 / relative_performance` for entries faster than the baseline
    pub speedup: Option<f64>,
    pub is_baseline: bool,
    pub validation: ValidationStatus,
}

/// Results ordered worst to best (median descending).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub baseline: String,
    pub baseline_mean: f64,
    pub unit: TimingUnit,
    pub entries: Vec<RankedEntry>,
}

/// Rank `results` against their single baseline.
///
/// Invalid results are left out unless `include_invalid`. A zero baseline
/// median ranks zero-median candidates at 1.0 and everything else at
/// infinity.
pub fn rank(results: &[BenchmarkResult], include_invalid: bool) -> Result<Ranking, ConfigurationError> {
    let baselines: Vec<&BenchmarkResult> = results.iter().filter(|r| r.is_baseline).collect();
    let baseline = match baselines.as_slice() {
        [] => return Err(ConfigurationError::MissingBaseline),
        [single] => *single,
        many => {
            return Err(ConfigurationError::MultipleBaselines {
                count: many.len(),
                names: many.iter().map(|r| r.name.clone()).collect(),
            })
        }
    };

    let base_median = baseline.median();
    let mut entries: Vec<RankedEntry> = results
        .iter()
        .filter(|r| include_invalid || !r.validation.is_invalid())
        .map(|r| {
            let relative_performance = if r.is_baseline {
                1.0
            } else {
                relative(r.median(), base_median)
            };
            let speedup = (relative_performance < 1.0).then(|| 1.0 / relative_performance);

            RankedEntry {
                name: r.name.clone(),
                median: r.median(),
                unit: r.unit,
                relative_performance,
                speedup,
                is_baseline: r.is_baseline,
                validation: r.validation,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.median.total_cmp(&a.median));

    Ok(Ranking {
        baseline: baseline.name.clone(),
        baseline_mean: baseline.latency.mean,
        unit: baseline.unit,
        entries,
    })
}

fn relative(median: f64, base_median: f64) -> f64 {
    if base_median == 0.0 {
        if median == 0.0 {
            1.0
        } else {
            f64::INFINITY
        }
    } else {
        median / base_median
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "BENCHMARK RESULTS SUMMARY")?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "Baseline: {} ({:.2} {})",
            self.baseline, self.baseline_mean, self.unit
        )?;
        writeln!(f)?;

        for entry in &self.entries {
            write!(
                f,
                "{:<20}: {:>10.1} {} ({:.2}x)",
                entry.name, entry.median, entry.unit, entry.relative_performance
            )?;
            match entry.speedup {
                Some(speedup) => write!(f, " - {:.1}x faster", speedup)?,
                None if entry.is_baseline => write!(f, " - baseline")?,
                None => {}
            }
            if entry.validation.is_invalid() {
                write!(f, " [invalid]")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{}", RULE)
    }
}

/// Per-benchmark statistics block.
#[derive(Debug, Clone, Copy)]
pub struct ResultSummary<'a>(pub &'a BenchmarkResult);

impl fmt::Display for ResultSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let unit = r.unit;

        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Benchmark: {}", r.name)?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "Iterations: {} warmup, {} timed",
            r.warmup_iterations, r.timed_iterations
        )?;
        writeln!(f, "Baseline: {}", if r.is_baseline { "Yes" } else { "No" })?;
        writeln!(f, "Valid: {}", r.validation)?;
        writeln!(f)?;
        writeln!(f, "Time:")?;
        writeln!(f, "  Median: {:.1} {}", r.latency.median, unit)?;
        writeln!(f, "  Mean:   {:.2} {}", r.latency.mean, unit)?;
        writeln!(f, "  StdDev: {:.2} {}", r.latency.stddev, unit)?;
        writeln!(f, "  Min:    {:.0} {}", r.latency.min, unit)?;
        writeln!(f, "  Max:    {:.0} {}", r.latency.max, unit)?;
        writeln!(f)?;
        writeln!(f, "Cache Performance (L1D read miss rate):")?;
        match &r.cache_miss_rate {
            Some(cmr) => {
                writeln!(f, "  Median: {:.2}%", cmr.median)?;
                writeln!(f, "  Mean:   {:.2}%", cmr.mean)?;
                writeln!(f, "  StdDev: {:.2}%", cmr.stddev)?;
                writeln!(f, "  Min:    {:.2}%", cmr.min)?;
                writeln!(f, "  Max:    {:.2}%", cmr.max)?;
            }
            None => writeln!(f, "  unsupported on this system")?,
        }
        writeln!(f, "{}", RULE)
    }
}

pub fn render_result(result: &BenchmarkResult) -> String {
    ResultSummary(result).to_string()
}

pub fn render_ranking(ranking: &Ranking) -> String {
    ranking.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::BenchmarkSpec;
    use crate::metrics::SampleSet;

    fn result(name: &str, latency: u64, baseline: bool, validation: ValidationStatus) -> BenchmarkResult {
        let spec = BenchmarkSpec::builder(name)
            .iterations(3)
            .baseline(baseline)
            .build()
            .unwrap();
        let samples = SampleSet::from_parts(vec![latency; 3], vec![0.0; 3], true).unwrap();
        let mut r = BenchmarkResult::from_samples(&spec, TimingUnit::Cycles, samples);
        r.validation = validation;
        r
    }

    #[test]
    fn test_rank_relative_and_speedup() {
        let results = vec![
            result("base", 100, true, ValidationStatus::Valid),
            result("fast", 50, false, ValidationStatus::Valid),
            result("slow", 200, false, ValidationStatus::NotValidated),
        ];
        let ranking = rank(&results, false).unwrap();

        let names: Vec<&str> = ranking.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "base", "fast"]);

        let fast = &ranking.entries[2];
        assert_eq!(fast.relative_performance, 0.5);
        assert_eq!(fast.speedup, Some(2.0));

        let base = &ranking.entries[1];
        assert_eq!(base.relative_performance, 1.0);
        assert_eq!(base.speedup, None);

        assert_eq!(ranking.entries[0].relative_performance, 2.0);
        assert_eq!(ranking.entries[0].speedup, None);
    }

    #[test]
    fn test_missing_and_multiple_baselines() {
        let none = vec![result("a", 1, false, ValidationStatus::NotValidated)];
        assert_eq!(rank(&none, false), Err(ConfigurationError::MissingBaseline));

        let two = vec![
            result("a", 1, true, ValidationStatus::NotValidated),
            result("b", 1, true, ValidationStatus::NotValidated),
        ];
        assert_eq!(
            rank(&two, false),
            Err(ConfigurationError::MultipleBaselines {
                count: 2,
                names: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_invalid_entries_filtered_unless_opted_in() {
        let results = vec![
            result("base", 100, true, ValidationStatus::Valid),
            result("buggy", 10, false, ValidationStatus::Invalid),
        ];
        assert_eq!(rank(&results, false).unwrap().entries.len(), 1);

        let ranking = rank(&results, true).unwrap();
        assert_eq!(ranking.entries.len(), 2);
        assert!(render_ranking(&ranking).contains("[invalid]"));
    }

    #[test]
    fn test_zero_baseline_median() {
        let results = vec![
            result("base", 0, true, ValidationStatus::NotValidated),
            result("also-zero", 0, false, ValidationStatus::NotValidated),
            result("nonzero", 3, false, ValidationStatus::NotValidated),
        ];
        let ranking = rank(&results, false).unwrap();
        let by_name = |name: &str| {
            ranking
                .entries
                .iter()
                .find(|e| e.name == name)
                .cloned()
                .unwrap()
        };

        assert_eq!(by_name("base").relative_performance, 1.0);
        assert_eq!(by_name("also-zero").relative_performance, 1.0);
        assert_eq!(by_name("nonzero").relative_performance, f64::INFINITY);
        assert_eq!(by_name("nonzero").speedup, None);
    }

    #[test]
    fn test_render_ranking_annotations() {
        let results = vec![
            result("base", 100, true, ValidationStatus::Valid),
            result("fast", 50, false, ValidationStatus::Valid),
        ];
        let text = render_ranking(&rank(&results, false).unwrap());
        assert!(text.contains("BENCHMARK RESULTS SUMMARY"));
        assert!(text.contains("(1.00x) - baseline"));
        assert!(text.contains("(0.50x) - 2.0x faster"));
    }

    #[test]
    fn test_render_result_without_counters() {
        let mut r = result("plain", 10, false, ValidationStatus::NotValidated);
        r.cache_miss_rate = None;
        let text = render_result(&r);
        assert!(text.contains("Benchmark: plain"));
        assert!(text.contains("Valid: Not Validated"));
        assert!(text.contains("unsupported on this system"));
        assert!(text.contains("Median: 10.0 cycles"));
    }
}
