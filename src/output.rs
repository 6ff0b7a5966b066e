use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::{Context, Result};
use benchmark::Stats;
use serde::Serialize;

/// One flattened CSV row per run.
#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    start: String,
    finish: String,
    url: &'a str,
    method: &'a str,
    connections: u64,
    duration_secs: u64,
    pipelining: u64,
    requests_avg: f64,
    requests_max: u64,
    requests_min: u64,
    requests_total: u64,
    latency_avg_ms: f64,
    latency_max_ms: f64,
    latency_min_ms: f64,
    latency_p50_ms: f64,
    latency_p90_ms: f64,
    latency_p99_ms: f64,
    latency_stddev_ms: f64,
    throughput_avg_bytes: f64,
    throughput_max_bytes: u64,
    throughput_total_bytes: u64,
    errors: u64,
    non_2xx: u64,
}

impl<'a> From<&'a Stats> for CsvRecord<'a> {
    fn from(stats: &'a Stats) -> Self {
        Self {
            start: stats.start.to_rfc3339(),
            finish: stats.finish.to_rfc3339(),
            url: &stats.url,
            method: &stats.method,
            connections: stats.connections,
            duration_secs: stats.duration,
            pipelining: stats.pipelining,
            requests_avg: stats.requests.average,
            requests_max: stats.requests.max,
            requests_min: stats.requests.min,
            requests_total: stats.requests.total,
            latency_avg_ms: stats.latency.average,
            latency_max_ms: stats.latency.max,
            latency_min_ms: stats.latency.min,
            latency_p50_ms: stats.latency.p50,
            latency_p90_ms: stats.latency.p90,
            latency_p99_ms: stats.latency.p99,
            latency_stddev_ms: stats.latency.stddev,
            throughput_avg_bytes: stats.throughput.average,
            throughput_max_bytes: stats.throughput.max,
            throughput_total_bytes: stats.throughput.total,
            errors: stats.errors,
            non_2xx: stats.non_2xx,
        }
    }
}

/// Appends `stats` to the CSV file at `path`, writing the header row only
/// when the file is new or empty.
pub fn append_csv(path: &Path, stats: &Stats) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;
    let is_empty = file
        .metadata()
        .with_context(|| format!("Failed to inspect output file {}", path.display()))?
        .len()
        == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_empty)
        .from_writer(file);
    writer
        .serialize(CsvRecord::from(stats))
        .context("Failed to write csv record")?;
    writer.flush().context("Failed to flush output file")?;
    Ok(())
}

pub fn print_json(out: &mut impl Write, stats: &Stats) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, stats).context("Failed to serialize stats")?;
    writeln!(out).context("Failed to write stats")?;
    Ok(())
}
