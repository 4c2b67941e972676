// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lossless raw-sample export.
//!
//! One CSV file per benchmark:
//!
//! ```text
//! # name: <name>
//! # timing format: cycles|microseconds
//! # is valid: Yes|No|Not Validated
//! # warmup runs: <n>
//! # timed runs: <n>
//! timing,cache_miss_rate
//! <latency>,<miss rate>
//! ```
//!
//! Rows keep iteration order. Miss rates use the shortest float text that
//! parses back to the same `f64`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BenchError, BenchResult, ConfigurationError};
use crate::metrics::BenchmarkResult;
use crate::types::{TimingUnit, ValidationStatus};

const COLUMN_HEADER: &str = "timing,cache_miss_rate";

/// File stem for a benchmark: spaces and path separators become `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

/// Write one file per result into `dir`, creating it if needed.
///
/// Every result is checked before anything is written: two names that
/// sanitize to the same file, a name that cannot sit on one header line, or
/// a result without its raw samples (as loaded from a stripped JSON report)
/// reject the whole batch. Returns the written paths in result order.
pub fn export(results: &[BenchmarkResult], dir: impl AsRef<Path>) -> BenchResult<Vec<PathBuf>> {
    let dir = dir.as_ref();

    if dir.as_os_str().is_empty() {
        return Err(ConfigurationError::InvalidExportPath {
            path: dir.to_path_buf(),
            reason: "path is empty".to_string(),
        }
        .into());
    }
    if dir.exists() && !dir.is_dir() {
        return Err(ConfigurationError::InvalidExportPath {
            path: dir.to_path_buf(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    let file_names = check_exportable(results)?;

    fs::create_dir_all(dir).map_err(|e| ConfigurationError::InvalidExportPath {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    results
        .iter()
        .zip(file_names)
        .map(|(result, file_name)| -> BenchResult<PathBuf> {
            let path = dir.join(file_name);
            let file = File::create(&path).map_err(|e| BenchError::Io {
                context: "creating export file",
                source: e,
            })?;

            let mut writer = BufWriter::new(file);
            write_record(&mut writer, result)
                .and_then(|()| writer.flush())
                .map_err(|e| BenchError::Io {
                    context: "writing export file",
                    source: e,
                })?;

            tracing::debug!(benchmark = %result.name, path = %path.display(), "Exported samples");
            Ok(path)
        })
        .collect()
}

/// File name for every result, or the first reason the batch cannot be
/// written losslessly.
fn check_exportable(results: &[BenchmarkResult]) -> Result<Vec<String>, ConfigurationError> {
    let mut owners: HashMap<String, &str> = HashMap::with_capacity(results.len());
    let mut file_names = Vec::with_capacity(results.len());

    for result in results {
        if result.name.chars().any(char::is_control) {
            return Err(ConfigurationError::ControlCharacterInName {
                name: result.name.clone(),
            });
        }

        if result.samples.len() as u64 != result.timed_iterations {
            return Err(ConfigurationError::MissingSamples {
                name: result.name.clone(),
                expected: result.timed_iterations,
                actual: result.samples.len(),
            });
        }

        let file_name = format!("{}.csv", sanitize_name(&result.name));
        if let Some(first) = owners.insert(file_name.clone(), &result.name) {
            return Err(ConfigurationError::ExportNameCollision {
                first: first.to_string(),
                second: result.name.clone(),
                file: file_name,
            });
        }
        file_names.push(file_name);
    }

    Ok(file_names)
}

/// Serialize one result in the export format.
pub fn write_record<W: Write>(out: &mut W, result: &BenchmarkResult) -> std::io::Result<()> {
    writeln!(out, "# name: {}", result.name)?;
    writeln!(out, "# timing format: {}", result.unit.export_label())?;
    writeln!(out, "# is valid: {}", result.validation.export_label())?;
    writeln!(out, "# warmup runs: {}", result.warmup_iterations)?;
    writeln!(out, "# timed runs: {}", result.timed_iterations)?;
    writeln!(out, "{}", COLUMN_HEADER)?;
    for (latency, miss_rate) in result.samples.iter() {
        writeln!(out, "{},{}", latency, miss_rate)?;
    }
    Ok(())
}

/// A parsed export file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    pub name: String,
    pub unit: TimingUnit,
    pub validation: ValidationStatus,
    pub warmup_iterations: u64,
    pub timed_iterations: u64,
    /// `(latency, miss_rate)` in iteration order
    pub rows: Vec<(u64, f64)>,
}

/// Read an export file back.
pub fn parse_export(path: impl AsRef<Path>) -> BenchResult<ExportRecord> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| BenchError::Io {
        context: "reading export file",
        source: e,
    })?;
    parse_record(&content)
}

/// Parse export text. Line numbers in errors are 1-based.
pub fn parse_record(content: &str) -> BenchResult<ExportRecord> {
    let mut lines = content.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut header = |key: &'static str| -> BenchResult<(usize, String)> {
        let (line, text) = lines
            .next()
            .ok_or_else(|| malformed(0, format!("missing '{}' header", key)))?;
        let value = text
            .strip_prefix("# ")
            .and_then(|rest| rest.strip_prefix(key))
            .and_then(|rest| rest.strip_prefix(": "))
            .ok_or_else(|| malformed(line, format!("expected '# {}: ...'", key)))?;
        Ok((line, value.to_string()))
    };

    let (_, name) = header("name")?;

    let (line, unit) = header("timing format")?;
    let unit = TimingUnit::from_export_label(&unit)
        .ok_or_else(|| malformed(line, format!("unknown timing format '{}'", unit)))?;

    let (line, validation) = header("is valid")?;
    let validation = ValidationStatus::from_export_label(&validation)
        .ok_or_else(|| malformed(line, format!("unknown validity '{}'", validation)))?;

    let (line, warmup) = header("warmup runs")?;
    let warmup_iterations = parse_field::<u64>(line, &warmup, "warmup runs")?;

    let (line, timed) = header("timed runs")?;
    let timed_iterations = parse_field::<u64>(line, &timed, "timed runs")?;

    match lines.next() {
        Some((_, COLUMN_HEADER)) => {}
        Some((line, other)) => {
            return Err(malformed(line, format!("expected '{}', found '{}'", COLUMN_HEADER, other)))
        }
        None => return Err(malformed(0, format!("missing '{}' header", COLUMN_HEADER))),
    }

    let rows = lines
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(line, text)| -> BenchResult<(u64, f64)> {
            let (latency, miss_rate) = text
                .split_once(',')
                .ok_or_else(|| malformed(line, "expected 'timing,cache_miss_rate'".to_string()))?;
            Ok((
                parse_field::<u64>(line, latency, "timing")?,
                parse_field::<f64>(line, miss_rate, "cache_miss_rate")?,
            ))
        })
        .collect::<BenchResult<Vec<_>>>()?;

    if rows.len() as u64 != timed_iterations {
        return Err(malformed(
            0,
            format!("{} rows but {} timed runs declared", rows.len(), timed_iterations),
        ));
    }

    Ok(ExportRecord {
        name,
        unit,
        validation,
        warmup_iterations,
        timed_iterations,
        rows,
    })
}

fn malformed(line: usize, reason: String) -> BenchError {
    BenchError::MalformedExport { line, reason }
}

fn parse_field<T: std::str::FromStr>(line: usize, value: &str, field: &str) -> BenchResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| malformed(line, format!("invalid {} '{}'", field, value)))
}
