// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for pinbench.
//!
//! Every config here points the governor and telemetry roots at a temp
//! directory, so pinned runs never touch the host's real cpufreq settings.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use pinbench_core::cache::UnsupportedCacheProbe;
use pinbench_core::export::export;
use pinbench_core::isolation::allowed_cores;
use pinbench_core::{
    parse_export, BenchError, CacheProbe, CacheReading, ConfigLoader, ConfigurationError,
    HarnessConfig, JsonReporter, ResourceError, Runner, Suite, ThreadState, TimingUnit,
    ValidationStatus,
};
use tempfile::TempDir;

/// Probe that alternates between two fixed readings.
struct AlternatingProbe {
    tick: bool,
}

impl CacheProbe for AlternatingProbe {
    fn begin(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn end(&mut self) -> Result<CacheReading, ResourceError> {
        self.tick = !self.tick;
        Ok(if self.tick {
            CacheReading {
                accesses: 3,
                misses: 1,
            }
        } else {
            CacheReading {
                accesses: 0,
                misses: 0,
            }
        })
    }
}

fn sandbox_config(root: &Path) -> HarnessConfig {
    let yaml = format!(
        r#"
iterations:
  warmup: 2
  timed: 50
isolation:
  settle_spins: 8
  cpu_root: {root}/cpu
telemetry:
  thermal_zone: {root}/temp
  proc_root: {root}/proc
"#,
        root = root.display()
    );
    ConfigLoader::load_string(&yaml).expect("sandbox config")
}

fn fake_governor(root: &Path, core: usize, value: &str) -> std::path::PathBuf {
    let dir = root.join("cpu").join(format!("cpu{}", core)).join("cpufreq");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scaling_governor");
    std::fs::write(&path, value).unwrap();
    path
}

fn first_allowed_core() -> usize {
    allowed_cores()
        .ok()
        .and_then(|cores| cores.first().copied())
        .unwrap_or(0)
}

fn busy_sum(n: u64) -> u64 {
    (0..n).fold(0u64, |acc, x| acc.wrapping_add(std::hint::black_box(x)))
}

#[test]
fn test_suite_rank_and_export_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let runner = Runner::new(&config).with_cache_probe(Box::new(AlternatingProbe { tick: false }));
    let mut suite = Suite::new(runner);

    suite
        .run(&config.spec("sum loop").baseline(true).build().unwrap(), || busy_sum(2_000))
        .unwrap();
    suite
        .run(&config.spec("short sum").build().unwrap(), || busy_sum(10))
        .unwrap();

    let ranking = suite.rank(false).unwrap();
    assert_eq!(ranking.baseline, "sum loop");
    assert_eq!(ranking.entries.len(), 2);
    assert!(ranking.entries[0].median >= ranking.entries[1].median);

    let paths = suite.export(temp_dir.path().join("data")).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("sum_loop.csv"));

    for (path, result) in paths.iter().zip(suite.results()) {
        let record = parse_export(path).unwrap();
        assert_eq!(record.name, result.name);
        assert_eq!(record.unit, TimingUnit::Microseconds);
        assert_eq!(record.timed_iterations, 50);
        assert_eq!(record.rows, result.samples.iter().collect::<Vec<_>>());
    }

    // 1 miss in 3 accesses, then a zero-access iteration.
    let rates = suite.results()[0].samples.miss_rates();
    assert_eq!(rates[0], 100.0 / 3.0);
    assert_eq!(rates[1], 0.0);
}

#[test]
fn test_validated_buffers_through_suite() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let mut suite = Suite::new(
        Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe)),
    );
    let mut buf = vec![0u8; 64];

    let fill = |out: &mut [u8]| {
        for (i, b) in out.iter_mut().enumerate() {
            *b = (i * 3) as u8;
        }
    };

    let baseline = config
        .spec("fill")
        .baseline(true)
        .validate(true)
        .output_size(64)
        .build()
        .unwrap();
    suite.run_with_output(&baseline, &mut buf, fill).unwrap();

    let same = config.spec("fill copy").validate(true).output_size(64).build().unwrap();
    assert_eq!(
        suite.run_with_output(&same, &mut buf, fill).unwrap().validation,
        ValidationStatus::Valid
    );

    let buggy = config.spec("fill buggy").validate(true).output_size(64).build().unwrap();
    assert_eq!(
        suite
            .run_with_output(&buggy, &mut buf, |out| {
                fill(out);
                out[63] ^= 0xFF;
            })
            .unwrap()
            .validation,
        ValidationStatus::Invalid
    );

    let unchecked = config.spec("fill unchecked").output_size(64).build().unwrap();
    assert_eq!(
        suite.run_with_output(&unchecked, &mut buf, |out| out.fill(9)).unwrap().validation,
        ValidationStatus::NotValidated
    );

    let ranked: Vec<String> = suite
        .rank(false)
        .unwrap()
        .entries
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(ranked.len(), 3);
    assert!(!ranked.contains(&"fill buggy".to_string()));
}

#[test]
fn test_thread_state_restored_after_unpinned_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let mut runner = Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe));

    let before = ThreadState::capture().unwrap();
    runner
        .run(&config.spec("unpinned").build().unwrap(), || busy_sum(100))
        .unwrap();
    assert_eq!(ThreadState::capture().unwrap(), before);
}

#[test]
fn test_thread_state_and_governor_restored_after_pinned_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let core = first_allowed_core();
    let governor = fake_governor(temp_dir.path(), core, "schedutil\n");
    let mut runner = Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe));

    let before = ThreadState::capture().unwrap();
    let spec = config.spec("pinned").pin_to(core).build().unwrap();
    runner
        .run(&spec, || {
            assert_eq!(std::fs::read_to_string(&governor).unwrap(), "performance");
            busy_sum(100)
        })
        .unwrap();

    assert_eq!(ThreadState::capture().unwrap(), before);
    assert_eq!(std::fs::read_to_string(&governor).unwrap(), "schedutil");
}

#[test]
fn test_thread_state_restored_after_panicking_callable() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let core = first_allowed_core();
    let governor = fake_governor(temp_dir.path(), core, "powersave");
    let mut runner = Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe));

    let before = ThreadState::capture().unwrap();

    for pin in [None, Some(core)] {
        let spec = config.spec("panics").core(pin).build().unwrap();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            runner.run(&spec, || -> u64 { panic!("callable failed") })
        }));
        assert!(outcome.is_err());
        assert_eq!(ThreadState::capture().unwrap(), before);
    }

    assert_eq!(std::fs::read_to_string(&governor).unwrap(), "powersave");
}

#[test]
fn test_config_file_drives_runner() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("pinbench.yaml");
    std::fs::write(
        &path,
        "iterations:\n  warmup: 0\n  timed: 7\nclock: cycles\nreporting:\n  include_invalid: true\n",
    )
    .unwrap();

    let config = ConfigLoader::load_file(&path).unwrap();
    assert!(config.reporting.include_invalid);

    let mut runner = Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe));
    let result = runner
        .run(&config.spec("from file").build().unwrap(), || busy_sum(50))
        .unwrap();

    assert_eq!(result.samples.len(), 7);
    assert_eq!(result.warmup_iterations, 0);
    assert_eq!(result.unit, runner.timer().unit());
}

#[test]
fn test_json_report_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let mut suite = Suite::new(
        Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe)),
    );
    suite
        .run(&config.spec("json base").baseline(true).build().unwrap(), || busy_sum(10))
        .unwrap();

    let reporter = JsonReporter::new(temp_dir.path().join("reports")).unwrap();
    let path = reporter.save(&suite.report(true)).unwrap();

    let loaded = JsonReporter::load(&path).unwrap();
    assert_eq!(loaded.benchmark_suite, "pinbench");
    assert_eq!(loaded.results[0].samples.len(), 50);
    assert!(loaded.results[0].cache_miss_rate.is_none());
}

#[test]
fn test_suites_sharing_export_dir_cannot_clobber() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let out = temp_dir.path().join("data");

    let mut first = Suite::new(
        Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe)),
    );
    first
        .run(&config.spec("fill buffer").baseline(true).build().unwrap(), || busy_sum(10))
        .unwrap();

    let mut second = Suite::new(
        Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe)),
    );
    second
        .run(&config.spec("fill_buffer").baseline(true).build().unwrap(), || busy_sum(20))
        .unwrap();

    let mut combined = first.into_results();
    combined.extend(second.into_results());

    assert!(matches!(
        export(&combined, &out),
        Err(BenchError::Configuration(ConfigurationError::ExportNameCollision { .. }))
    ));
    assert!(!out.join("fill_buffer.csv").exists());
}

#[test]
fn test_stripped_json_results_cannot_be_exported() {
    let temp_dir = TempDir::new().unwrap();
    let config = sandbox_config(temp_dir.path());
    let mut suite = Suite::new(
        Runner::new(&config).with_cache_probe(Box::new(UnsupportedCacheProbe)),
    );
    suite
        .run(&config.spec("stripped").baseline(true).build().unwrap(), || busy_sum(10))
        .unwrap();

    let reporter = JsonReporter::new(temp_dir.path().join("reports")).unwrap();
    let loaded = JsonReporter::load(reporter.save(&suite.report(false)).unwrap()).unwrap();

    assert!(matches!(
        export(&loaded.results, temp_dir.path().join("data")),
        Err(BenchError::Configuration(ConfigurationError::MissingSamples { expected: 50, actual: 0, .. }))
    ));
}
