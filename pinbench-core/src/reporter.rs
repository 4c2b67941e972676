// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! JSON suite reports.
//!
//! Saves a [`SuiteReport`] to a timestamped JSON file for later comparison
//! across runs on the same machine.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BenchError, BenchResult};
use crate::metrics::SuiteReport;

/// JSON reporter for suite results.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a reporter writing into `output_dir`, creating it if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> BenchResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|e| BenchError::Io {
            context: "creating report directory",
            source: e,
        })?;
        Ok(Self { output_dir })
    }

    /// Save a report as `suite_<timestamp>.json`.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &SuiteReport) -> BenchResult<PathBuf> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%SZ");
        let filepath = self.output_dir.join(format!("suite_{}.json", timestamp));

        let file = File::create(&filepath).map_err(|e| BenchError::Io {
            context: "creating report file",
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush().map_err(|e| BenchError::Io {
            context: "writing report file",
            source: e,
        })?;

        tracing::info!(path = %filepath.display(), "Suite report saved");
        Ok(filepath)
    }

    /// List all JSON reports in the output directory, sorted by name.
    pub fn list_reports(&self) -> BenchResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.output_dir).map_err(|e| BenchError::Io {
            context: "listing report directory",
            source: e,
        })?;

        let mut reports: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        reports.sort();
        Ok(reports)
    }

    /// Load an existing report.
    pub fn load(path: impl AsRef<Path>) -> BenchResult<SuiteReport> {
        let file = File::open(path).map_err(|e| BenchError::Io {
            context: "opening report file",
            source: e,
        })?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::BenchmarkSpec;
    use crate::metrics::{BenchmarkResult, SampleSet};
    use crate::types::TimingUnit;
    use tempfile::TempDir;

    fn report() -> SuiteReport {
        let spec = BenchmarkSpec::builder("json").iterations(3).build().unwrap();
        let samples = SampleSet::from_parts(vec![3, 1, 2], vec![0.5, 1.5, 1.0], true).unwrap();
        let result = BenchmarkResult::from_samples(&spec, TimingUnit::Cycles, samples);
        SuiteReport::new(&[result], false)
    }

    #[test]
    fn test_reporter_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        let report = report();
        let path = reporter.save(&report).unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("suite_"));

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].name, "json");
        assert_eq!(loaded.results[0].latency.median, 2.0);
        assert!(loaded.results[0].samples.is_empty());
    }

    #[test]
    fn test_list_reports() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path().join("nested")).unwrap();
        reporter.save(&report()).unwrap();
        std::fs::write(temp_dir.path().join("nested").join("notes.txt"), "x").unwrap();

        let reports = reporter.list_reports().unwrap();
        assert_eq!(reports.len(), 1);
    }
}
