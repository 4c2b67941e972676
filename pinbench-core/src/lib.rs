//! pinbench Core Library
//!
//! Low-noise microbenchmarking: runs a callable under CPU isolation, times
//! every iteration with the wall clock or the hardware cycle counter,
//! samples the L1D read miss rate, and compares candidates against a single
//! baseline.
//!
//! # Pipeline
//!
//! - **Runner**: isolation, warmup, timed loop, per-iteration samples
//! - **Validator**: byte-exact comparison against the baseline's output
//! - **Stats**: median/mean/stddev/variance/min/max
//! - **Reporting**: console blocks, baseline-relative ranking, CSV and JSON export

pub mod benchmark;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod harness;
pub mod isolation;
pub mod metrics;
pub mod reporter;
pub mod state;
pub mod stats;
pub mod suite;
pub mod summary;
pub mod telemetry;
pub mod timer;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use benchmark::{BenchmarkSpec, BenchmarkSpecBuilder};
pub use cache::{CacheProbe, CacheReading};
pub use config::{ConfigLoader, HarnessConfig, ReportingConfig};
pub use error::{BenchError, BenchResult, ConfigurationError, ResourceError, StateTransitionError};
pub use export::{parse_export, ExportRecord};
pub use harness::Runner;
pub use isolation::{IsolationController, IsolationReport, IsolationSettings, ThreadState};
pub use metrics::{BenchmarkResult, SampleSet, SuiteReport, SystemInfo};
pub use reporter::JsonReporter;
pub use state::{RunPhase, RunStateMachine};
pub use stats::Stats;
pub use suite::Suite;
pub use summary::{rank, Ranking, RankedEntry};
pub use telemetry::{TelemetryReader, TelemetrySettings, TelemetrySnapshot};
pub use timer::TimerBackend;
pub use types::{ClockSource, CoreId, TimingUnit, ValidationStatus};
pub use validator::GroundTruth;
