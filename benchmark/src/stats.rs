use chrono::{DateTime, Utc};
use hdrhistogram::{CreationError, Histogram};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::settings::BenchmarkConfig;

/// Outcome of a finished run.
///
/// Per-second figures (`requests`, `throughput`) are taken over the samples
/// closed once every elapsed second; latencies are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub url: String,
    pub method: String,
    pub connections: u64,
    /// Seconds.
    pub duration: u64,
    pub pipelining: u64,
    pub requests: RequestStats,
    pub latency: LatencyStats,
    pub throughput: ThroughputStats,
    pub errors: u64,
    pub non_2xx: u64,
    pub status_codes: StatusCodeStats,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestStats {
    pub average: f64,
    pub max: u64,
    pub min: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub stddev: f64,
}

/// Bytes received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    pub average: f64,
    pub max: u64,
    pub min: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodeStats {
    #[serde(rename = "1xx")]
    pub informational: u64,
    #[serde(rename = "2xx")]
    pub success: u64,
    #[serde(rename = "3xx")]
    pub redirection: u64,
    #[serde(rename = "4xx")]
    pub client_error: u64,
    #[serde(rename = "5xx")]
    pub server_error: u64,
}

impl StatusCodeStats {
    pub fn record(&mut self, status: u16) {
        match status {
            100..=199 => self.informational += 1,
            200..=299 => self.success += 1,
            300..=399 => self.redirection += 1,
            400..=499 => self.client_error += 1,
            _ => self.server_error += 1,
        }
    }
}

const LATENCY_LOWEST_US: u64 = 1;
const LATENCY_HIGHEST_US: u64 = 60 * 60 * 1_000_000;
const LATENCY_SIGFIG: u8 = 3;

/// Raw measurements accumulated by the collector.
pub(crate) struct Samples {
    pub requests_per_second: Vec<u64>,
    pub bytes_per_second: Vec<u64>,
    /// Microseconds, saturating at one hour.
    pub latencies: Histogram<u64>,
    pub total_requests: u64,
    pub total_bytes: u64,
    pub errors: u64,
    pub status_codes: StatusCodeStats,
}

impl Samples {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            requests_per_second: Vec::new(),
            bytes_per_second: Vec::new(),
            latencies: Histogram::new_with_bounds(
                LATENCY_LOWEST_US,
                LATENCY_HIGHEST_US,
                LATENCY_SIGFIG,
            )?,
            total_requests: 0,
            total_bytes: 0,
            errors: 0,
            status_codes: StatusCodeStats::default(),
        })
    }
}

impl Stats {
    pub(crate) fn from_samples(
        config: &BenchmarkConfig,
        samples: Samples,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Self {
        let (requests_average, requests_max, requests_min) =
            summarize_counts(&samples.requests_per_second);
        let (bytes_average, bytes_max, bytes_min) = summarize_counts(&samples.bytes_per_second);
        let non_2xx = samples
            .total_requests
            .saturating_sub(samples.status_codes.success);

        Self {
            url: config.url().to_string(),
            method: config.method().to_string(),
            connections: config.connections(),
            duration: config.duration().as_secs(),
            pipelining: config.pipelining(),
            requests: RequestStats {
                average: requests_average,
                max: requests_max,
                min: requests_min,
                total: samples.total_requests,
            },
            latency: summarize_latencies(&samples.latencies),
            throughput: ThroughputStats {
                average: bytes_average,
                max: bytes_max,
                min: bytes_min,
                total: samples.total_bytes,
            },
            errors: samples.errors,
            non_2xx,
            status_codes: samples.status_codes,
            start,
            finish,
        }
    }
}

fn summarize_counts(buckets: &[u64]) -> (f64, u64, u64) {
    if buckets.is_empty() {
        return (0.0, 0, 0);
    }
    let mean = buckets.iter().map(|&count| count as f64).mean();
    let max = Iterator::max(buckets.iter().copied()).unwrap_or_default();
    let min = Iterator::min(buckets.iter().copied()).unwrap_or_default();
    (round_2(mean), max, min)
}

fn summarize_latencies(latencies: &Histogram<u64>) -> LatencyStats {
    if latencies.len() == 0 {
        return LatencyStats::default();
    }
    let ms = |us: f64| round_2(us / 1000.0);
    let quantile = |q: f64| ms(latencies.value_at_quantile(q) as f64);

    LatencyStats {
        average: ms(latencies.mean()),
        max: ms(latencies.max() as f64),
        min: ms(latencies.min() as f64),
        p50: quantile(0.50),
        p90: quantile(0.90),
        p99: quantile(0.99),
        stddev: ms(latencies.stdev()),
    }
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Samples {
        let mut status_codes = StatusCodeStats::default();
        for status in [200, 200, 204, 301, 404, 503] {
            status_codes.record(status);
        }
        let mut latencies = Samples::new().expect("histogram").latencies;
        for ms in [1, 2, 3, 4, 100] {
            latencies.record(ms * 1000).expect("in range");
        }
        Samples {
            requests_per_second: vec![10, 20, 30],
            bytes_per_second: vec![1024, 2048, 3072],
            latencies,
            total_requests: 6,
            total_bytes: 6144,
            errors: 2,
            status_codes,
        }
    }

    #[test]
    fn status_codes_are_bucketed_by_class() {
        let stats = samples().status_codes;
        assert_eq!(stats.informational, 0);
        assert_eq!(stats.success, 3);
        assert_eq!(stats.redirection, 1);
        assert_eq!(stats.client_error, 1);
        assert_eq!(stats.server_error, 1);
    }

    #[test]
    fn summarizes_per_second_samples() {
        let now = Utc::now();
        let stats = Stats::from_samples(&BenchmarkConfig::default(), samples(), now, now);

        assert_eq!(stats.url, "http://localhost:1337/movies");
        assert_eq!(stats.method, "GET");
        assert_eq!(stats.connections, 100);
        assert_eq!(stats.duration, 10);
        assert_eq!(stats.pipelining, 10);

        assert_eq!(stats.requests.average, 20.0);
        assert_eq!(stats.requests.max, 30);
        assert_eq!(stats.requests.min, 10);
        assert_eq!(stats.requests.total, 6);

        assert_eq!(stats.throughput.average, 2048.0);
        assert_eq!(stats.throughput.max, 3072);
        assert_eq!(stats.throughput.total, 6144);

        assert_eq!(stats.non_2xx, 3);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn summarizes_latencies() {
        let now = Utc::now();
        let latency = Stats::from_samples(&BenchmarkConfig::default(), samples(), now, now).latency;
        // three significant digits
        assert!((latency.average - 22.0).abs() < 0.1);
        assert!((latency.max - 100.0).abs() < 0.1);
        assert_eq!(latency.min, 1.0);
        assert!(latency.p50 >= 2.0 && latency.p50 <= 4.01);
        assert!(latency.p99 > latency.p50);
        assert!(latency.stddev > 30.0);
    }

    #[test]
    fn empty_run_is_all_zero() {
        let now = Utc::now();
        let stats = Stats::from_samples(
            &BenchmarkConfig::default(),
            Samples::new().expect("histogram"),
            now,
            now,
        );
        assert_eq!(stats.requests, RequestStats::default());
        assert_eq!(stats.latency, LatencyStats::default());
        assert_eq!(stats.throughput, ThroughputStats::default());
        assert_eq!(stats.non_2xx, 0);
    }

    #[test]
    fn serializes_status_classes_like_the_wire_report() {
        let json = serde_json::to_value(StatusCodeStats {
            success: 4,
            ..Default::default()
        })
        .expect("serializable");
        assert_eq!(json["2xx"], 4);
        assert_eq!(json["5xx"], 0);
    }
}
