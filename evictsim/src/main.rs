mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use evictlib::benchmark::{prepare, run_suite, workloads_on_disk, BenchmarkReport, Stage};
use evictlib::config::{BenchmarkConfig, StoreAddress, StoreKind};
use evictlib::io::write_json_atomic;
use evictlib::report::{render_results, ResultsReport};
use evictlib::source::MemorySource;
use evictlib::store::{BackingStore, MemoryStore, RespStore};
use crate::logging::LogFormat;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Benchmarks cache eviction policies against synthesized record workloads"))]
struct Args {
    config: PathBuf,

    /// Use the workloads already in the data directory instead of preparing new ones
    #[arg(long)]
    skip_prepare: bool,

    /// Overrides the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Also writes the results as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Prints the results as JSON instead of a table
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

/// A fatal error, with the stage it stopped the pipeline in
struct Failure {
    stage: Stage,
    message: String,
}

impl Failure {
    fn at(stage: Stage) -> impl Fn(evictlib::Error) -> Failure {
        move |e| Failure { stage, message: e.to_string() }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);
    match run(&args) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            let failed = report.failures().count();
            error!(failed, total = report.runs.len(), "some runs failed");
            ExitCode::FAILURE
        }
        Err(failure) => {
            error!(stage = %failure.stage, error = %failure.message, "benchmark aborted");
            ExitCode::FAILURE
        }
    }
}

fn open_store(config: &BenchmarkConfig) -> Result<Box<dyn BackingStore>, evictlib::Error> {
    Ok(match config.store.kind {
        StoreKind::Memory => Box::new(MemoryStore::new()),
        StoreKind::Resp => Box::new(RespStore::new(StoreAddress::parse(&config.store.url)?)),
    })
}

fn run(args: &Args) -> Result<BenchmarkReport, Failure> {
    let start = Instant::now();
    let mut config = BenchmarkConfig::from_path(&args.config).map_err(Failure::at(Stage::Prepare))?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let artifacts = if args.skip_prepare {
        info!(data_dir = %config.data_dir.display(), "skipping prepare, using workloads on disk");
        workloads_on_disk(&config).map_err(Failure::at(Stage::LoadWorkload))?
    } else {
        let mut source = MemorySource::from_path(&config.records, config.seed).map_err(Failure::at(Stage::Prepare))?;
        let prepared = prepare(&config, &mut source).map_err(Failure::at(Stage::Prepare))?;
        prepared.artifacts
    };
    let prepare_time = start.elapsed();

    let mut store = open_store(&config).map_err(Failure::at(Stage::Simulate))?;
    let simulation_start = Instant::now();
    let report = run_suite(&config, &artifacts, &mut *store);
    let simulation_time = simulation_start.elapsed();
    // Results of completed runs are emitted even when others failed
    let rendered = render_results(&report.runs, args.json).map_err(|e| Failure { stage: Stage::Simulate, message: format!("Couldn't serialise the output {e}") })?;
    print!("{rendered}");
    if let Some(output) = &args.output {
        write_results(output, &report).map_err(Failure::at(Stage::Simulate))?;
    }

    if args.performance {
        let total_time = start.elapsed();
        println!("Prepare time: {}s", prepare_time.as_nanos() as f64 / 1e9);
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes loading, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    // Stderr, so the results on stdout stay parseable
    if args.debug {
        #[cfg(debug_assertions)]
        eprintln!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        eprintln!("Parsed input configuration: {config:?}");
    }
    Ok(report)
}

fn write_results(path: &Path, report: &BenchmarkReport) -> Result<(), evictlib::Error> {
    let results = ResultsReport {
        generated_at: Utc::now(),
        runs: report.runs.clone(),
    };
    write_json_atomic(path, &results)?;
    info!(path = %path.display(), "results written");
    Ok(())
}
