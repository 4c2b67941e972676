// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! pinbench CLI
//!
//! Demo driver: runs the example workloads under the harness, prints
//! per-benchmark and comparative reports, and exports raw samples.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pinbench_core::export;
use pinbench_core::summary::{render_ranking, render_result};
use pinbench_core::{
    ClockSource, ConfigLoader, CoreId, HarnessConfig, JsonReporter, Runner, Suite, SuiteReport,
    SystemInfo, TelemetryReader,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod workloads;

/// pinbench - low-noise microbenchmark harness demo
#[derive(Parser)]
#[command(name = "pinbench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Harness configuration file (YAML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for raw-sample CSV exports (overrides the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Core for the pinned benchmarks
    #[arg(long)]
    core: Option<usize>,

    /// Time with the hardware cycle counter instead of the wall clock
    #[arg(long)]
    cycles: bool,

    /// Warmup iterations per benchmark
    #[arg(short, long)]
    warmup: Option<u64>,

    /// Timed iterations per benchmark
    #[arg(short, long)]
    iterations: Option<u64>,

    /// Rank benchmarks whose output failed validation
    #[arg(long)]
    include_invalid: bool,

    /// Also write a JSON suite report
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(dir) = &args.output {
        config.reporting.export_dir = dir.clone();
    }
    if let Some(core) = args.core {
        config.core = Some(CoreId::new(core)?);
    }
    if args.cycles {
        config.clock = ClockSource::Cycles;
    }
    if let Some(warmup) = args.warmup {
        config.warmup_iterations = warmup;
    }
    if let Some(iterations) = args.iterations {
        config.timed_iterations = iterations;
    }
    config.reporting.include_invalid |= args.include_invalid;
    config.reporting.json |= args.json;

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let config = load_config(&args)?;
    info!(
        clock = ?config.clock,
        core = ?config.core.map(|c| c.index()),
        export_dir = ?config.reporting.export_dir,
        "Configuration loaded"
    );
    let telemetry = TelemetryReader::new(config.telemetry.clone());

    let system = SystemInfo::collect();
    let snapshot = telemetry.snapshot();

    println!("pinbench");
    println!("========");
    println!("Host: {} ({} {})", system.hostname, system.os, system.os_version);
    println!("CPU: {}", system.cpu_model);
    println!("Available CPU cores: {}", snapshot.core_count);
    if let Some(temp) = snapshot.temperature_c {
        println!("CPU temperature: {:.1} C", temp);
    }
    println!("Clock: {:?}", config.clock);
    println!(
        "Iterations: {} warmup, {} timed",
        config.warmup_iterations, config.timed_iterations
    );
    println!();

    let loops = run_loop_suite(&config)?;
    let buffers = run_buffer_suite(&config)?;

    for suite in [&loops, &buffers] {
        for result in suite.results() {
            print!("{}", render_result(result));
        }
        let ranking = suite.rank(config.reporting.include_invalid)?;
        print!("{}", render_ranking(&ranking));
    }

    // One export call for both suites, so a name clash between them is caught.
    let mut results = loops.into_results();
    results.extend(buffers.into_results());

    let export_dir = &config.reporting.export_dir;
    let written = export::export(&results, export_dir)?;
    println!();
    println!("Raw samples exported to {:?} ({} files)", export_dir, written.len());

    if config.reporting.json {
        let reporter = JsonReporter::new(export_dir)?;
        let report = SuiteReport::new(&results, config.reporting.keep_raw_samples);
        let path = reporter.save(&report)?;
        println!("Suite report saved to {:?}", path);
    }

    Ok(())
}

/// Three arithmetic loops, the cheapest as baseline; the float loop runs pinned.
fn run_loop_suite(config: &HarnessConfig) -> anyhow::Result<Suite> {
    let mut suite = Suite::new(Runner::new(config));

    let baseline = config.spec("Sum Loop").core(None).baseline(true).build()?;
    suite.run(&baseline, workloads::sum_loop)?;

    let pinned = config.spec("Float Loop").build()?;
    suite.run(&pinned, workloads::float_loop)?;

    let slow = config.spec("Nested Loop").core(None).build()?;
    suite.run(&slow, workloads::nested_loop)?;

    Ok(suite)
}

/// Buffer fill baseline plus a correct and a broken rewrite, all validated.
fn run_buffer_suite(config: &HarnessConfig) -> anyhow::Result<Suite> {
    let mut suite = Suite::new(Runner::new(config));
    let mut buffer = vec![0u8; workloads::BUFFER_LEN];

    let spec = |name: &str, baseline: bool| {
        config
            .spec(name)
            .baseline(baseline)
            .validate(true)
            .output_size(workloads::BUFFER_LEN)
            .build()
    };

    suite.run_with_output(&spec("Fill Bytewise", true)?, &mut buffer, workloads::fill_bytewise)?;
    suite.run_with_output(&spec("Fill Wordwise", false)?, &mut buffer, workloads::fill_wordwise)?;
    suite.run_with_output(&spec("Fill Short", false)?, &mut buffer, workloads::fill_short)?;

    Ok(suite)
}
