// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Descriptive statistics over one sample sequence.
//!
//! Every function treats an empty input as all-zero rather than dividing by
//! zero. Standard deviation and variance are population statistics (divisor
//! N).

use serde::{Deserialize, Serialize};

use crate::metrics::SampleSet;

/// Aggregated statistics for one sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub median: f64,
    pub mean: f64,
    pub stddev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    /// Reduce a sequence to its statistics.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let (min, max) = min_max(values);
        let variance = variance(values);

        Self {
            median: median(values),
            mean: mean(values),
            stddev: variance.sqrt(),
            variance,
            min,
            max,
        }
    }

    /// Same as [`Stats::from_values`] for integer latency samples.
    pub fn from_u64(values: &[u64]) -> Self {
        let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        Self::from_values(&values)
    }
}

/// Reduce both sequences of a sample set independently.
///
/// Returns `(latency, cache_miss_rate)`.
pub fn aggregate(samples: &SampleSet) -> (Stats, Stats) {
    (
        Stats::from_u64(samples.latencies()),
        Stats::from_values(samples.miss_rates()),
    )
}

/// Median of a sorted copy; even lengths average indices `n/2 - 1` and `n/2`.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance: mean of squared deviations from the mean.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mean = mean(values);
    values
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64
}

pub fn stddev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Linear scan for `(min, max)`.
pub fn min_max(values: &[f64]) -> (f64, f64) {
    let Some(&first) = values.first() else {
        return (0.0, 0.0);
    };

    values.iter().skip(1).fold((first, first), |(lo, hi), &v| {
        (if v < lo { v } else { lo }, if v > hi { v } else { hi })
    })
}
