//! Custom error types for pinbench.
//!
//! Explicit enum error types, no `Box<dyn Error>` and no `anyhow::Result`
//! inside the library. Hardware and isolation failures are downgraded to
//! warnings at the syscall boundary, so `ResourceError` usually surfaces only
//! through logs; configuration mistakes are returned to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the harness.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Returned to the Caller, Never a Panic
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Run State Machine Errors
    // =========================================================================
    #[error("Invalid run phase transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // Isolation / Counter Errors - Best Effort, Normally Only Logged
    // =========================================================================
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(#[from] ResourceError),

    // =========================================================================
    // Export / Report Errors
    // =========================================================================
    #[error("Malformed export record at line {line}: {reason}")]
    MalformedExport { line: usize, reason: String },

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Caller-side mistakes: bad specs, bad comparison sets, bad paths.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No baseline benchmark found in the comparison set")]
    MissingBaseline,

    #[error("Expected exactly one baseline, found {count}: {names:?}")]
    MultipleBaselines { count: usize, names: Vec<String> },

    #[error("Benchmark '{name}' has zero timed iterations")]
    ZeroTimedIterations { name: String },

    #[error("Benchmark name cannot be empty")]
    EmptyName,

    #[error("Benchmark name {name:?} contains control characters")]
    ControlCharacterInName { name: String },

    #[error("Invalid core {core}: must be below {limit}")]
    InvalidCore { core: usize, limit: usize },

    #[error("Output buffer for '{name}' is {actual} bytes, declared size is {expected}")]
    OutputSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid export path {path}: {reason}")]
    InvalidExportPath { path: PathBuf, reason: String },

    #[error("Benchmarks {first:?} and {second:?} both export to {file}")]
    ExportNameCollision {
        first: String,
        second: String,
        file: String,
    },

    #[error("Benchmark '{name}' declares {expected} timed runs but holds {actual} samples")]
    MissingSamples {
        name: String,
        expected: u64,
        actual: usize,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// State transition errors for the per-run phase machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} for benchmark '{benchmark}'")]
    InvalidTransition {
        benchmark: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Benchmark '{benchmark}' is in terminal phase: {phase}")]
    TerminalPhase {
        benchmark: String,
        phase: &'static str,
    },
}

/// Isolation or hardware-counter facilities that are missing or denied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{feature} is not supported on this platform")]
    Unsupported { feature: &'static str },

    #[error("Permission denied for {operation} (needs root, CAP_SYS_NICE or CAP_PERFMON)")]
    PermissionDenied { operation: &'static str },

    #[error("{operation} failed: {message}")]
    Syscall {
        operation: &'static str,
        message: String,
    },
}

impl ResourceError {
    /// Classify an OS error raised by `operation`.
    pub fn from_io(operation: &'static str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { operation },
            _ if err.raw_os_error() == Some(libc::EPERM) => Self::PermissionDenied { operation },
            _ if err.raw_os_error() == Some(libc::ENOENT)
                || err.raw_os_error() == Some(libc::ENODEV)
                || err.raw_os_error() == Some(libc::EOPNOTSUPP) =>
            {
                Self::Unsupported { feature: operation }
            }
            _ => Self::Syscall {
                operation,
                message: err.to_string(),
            },
        }
    }

    /// Classify a nix errno raised by `operation`.
    pub fn from_errno(operation: &'static str, errno: nix::errno::Errno) -> Self {
        Self::from_io(operation, &std::io::Error::from(errno))
    }
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::ZeroTimedIterations {
            name: "memcpy".to_string(),
        };
        assert!(err.to_string().contains("memcpy"));
        assert!(err.to_string().contains("zero timed iterations"));
    }

    #[test]
    fn test_error_chain() {
        let bench_err: BenchError = ConfigurationError::MissingBaseline.into();
        assert!(matches!(
            bench_err,
            BenchError::Configuration(ConfigurationError::MissingBaseline)
        ));
    }

    #[test]
    fn test_resource_error_classification() {
        let denied = std::io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(
            ResourceError::from_io("perf_event_open", &denied),
            ResourceError::PermissionDenied {
                operation: "perf_event_open"
            }
        );

        let eperm = std::io::Error::from_raw_os_error(libc::EPERM);
        assert!(matches!(
            ResourceError::from_io("sched_setscheduler", &eperm),
            ResourceError::PermissionDenied { .. }
        ));

        let missing = std::io::Error::from_raw_os_error(libc::ENOENT);
        assert!(matches!(
            ResourceError::from_io("scaling_governor", &missing),
            ResourceError::Unsupported { .. }
        ));
    }
}
