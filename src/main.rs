use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Result;
use benchmark::{BenchmarkConfig, HttpLoadGenerator, LoadGenerator, Stats};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod args;
mod config;
mod output;
mod progress;
mod report;

use crate::{args::Args, progress::RunProgress};

const DEFAULT_LOG_FILTER: &str = "warn";

/// Where the statistics of a successful run go.
#[derive(Debug, Default)]
struct OutputOptions {
    json: bool,
    output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let config = match config::load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", report::render_failure(&format!("{e:#}")));
            return ExitCode::FAILURE;
        }
    };

    let progress = RunProgress::new(config.duration().as_secs(), !args.no_progress);
    let generator = HttpLoadGenerator::new().with_progress(progress);
    let options = OutputOptions {
        json: args.json,
        output_file: args.output_file,
    };

    execute(
        &generator,
        &config,
        &options,
        &mut io::stdout(),
        &mut io::stderr(),
    )
    .await
    .into()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Runs the benchmark once and reports the result.
///
/// A failed run writes exactly one line to `err` and nothing to `out`.
async fn execute(
    generator: &impl LoadGenerator,
    config: &BenchmarkConfig,
    options: &OutputOptions,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Outcome {
    info!(url = %config.url(), "running benchmark");
    let stats = match generator.run(config).await {
        Ok(stats) => stats,
        Err(e) => {
            debug!(error = ?e, "benchmark run failed");
            let _ = writeln!(err, "{}", report::render_failure(&e));
            return Outcome::Failed;
        }
    };

    match emit(&stats, options, out) {
        Ok(()) => Outcome::Success,
        Err(e) => {
            let _ = writeln!(err, "Failed to write results: {e:#}");
            Outcome::Failed
        }
    }
}

fn emit(stats: &Stats, options: &OutputOptions, out: &mut impl Write) -> Result<()> {
    if options.json {
        output::print_json(out, stats)?;
    } else {
        report::print_report(out, stats)?;
    }
    if let Some(path) = &options.output_file {
        output::append_csv(path, stats)?;
    }
    Ok(())
}
