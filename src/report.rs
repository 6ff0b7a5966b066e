use std::{
    fmt::Display,
    io::{self, Write},
};

use benchmark::Stats;

const LABEL_WIDTH: usize = 15;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn to_mb(bytes: f64) -> String {
    format!("{:.2}", bytes / BYTES_PER_MB)
}

fn line(out: &mut String, label: &str, value: impl Display) {
    out.push_str(&format!("{label:<LABEL_WIDTH$}  {value}\n"));
}

/// Renders the summary report printed after a successful run.
pub fn render(stats: &Stats) -> String {
    let mut out = String::new();
    out.push_str("\n🏁 BENCHMARK RESULTS\n\n");

    line(&mut out, "URL:", &stats.url);
    line(&mut out, "Connections:", stats.connections);
    line(&mut out, "Duration:", format_args!("{}s", stats.duration));
    line(&mut out, "Pipelining:", stats.pipelining);

    out.push_str("\n📊 Stats:\n");
    line(
        &mut out,
        "Requests/sec:",
        format_args!(
            "{} avg, {} max",
            stats.requests.average.round(),
            stats.requests.max
        ),
    );
    line(
        &mut out,
        "Latency (ms):",
        format_args!(
            "{} avg, {} max",
            stats.latency.average.round(),
            stats.latency.max
        ),
    );
    line(
        &mut out,
        "Throughput:",
        format_args!("{} MB/sec (avg)", to_mb(stats.throughput.average)),
    );

    out.push_str("\n📈 Totals:\n");
    line(&mut out, "Total Requests:", stats.requests.total);
    line(
        &mut out,
        "Total Bytes:",
        format_args!("{} MB", to_mb(stats.throughput.total as f64)),
    );
    out
}

pub fn print_report(out: &mut impl Write, stats: &Stats) -> io::Result<()> {
    out.write_all(render(stats).as_bytes())?;
    out.flush()
}

/// The single line written to stderr when a run produced no statistics.
pub fn render_failure(err: &dyn Display) -> String {
    format!("Benchmark failed: {err}")
}
