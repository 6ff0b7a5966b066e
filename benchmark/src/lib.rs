//! HTTP/1.1 load generation against a single URL.
//!
//! [`HttpLoadGenerator`] opens the configured number of connections, keeps
//! `pipelining` requests in flight on each of them for the configured
//! duration and summarizes the run into [`Stats`].

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use hyper::Method;
use tokio::{net::lookup_host, sync::mpsc::channel, time::Instant};
use tracing::{debug, info};

mod codec;
mod collector;
mod connection;
mod error;
mod settings;
mod stats;

pub use connection::{Connector, TcpConnector};
pub use error::{ConfigError, RunError};
pub use settings::{
    build_uri, parse_method, BenchmarkConfig, BenchmarkConfigBuilder, DEFAULT_CONNECTIONS,
    DEFAULT_DURATION_SECS, DEFAULT_PIPELINING, DEFAULT_URL, MAX_CONNECTIONS, MAX_DURATION_SECS,
    MAX_PIPELINING,
};
pub use stats::{LatencyStats, RequestStats, StatusCodeStats, Stats, ThroughputStats};

use crate::{
    collector::collect,
    connection::{connection_task, ConnectionSettings},
    stats::Samples,
};

const EVENTS_PER_CONNECTION: usize = 64;

pub trait Process: Send + Sync {
    /// Called once for every elapsed second of the run
    fn inc(&self);
    // Called once when the run is over
    fn finish(&self);
}

/// Progress hook that ignores every update.
pub struct NoProgress;

impl Process for NoProgress {
    fn inc(&self) {}

    fn finish(&self) {}
}

#[async_trait]
pub trait LoadGenerator: Send + Sync {
    async fn run(&self, config: &BenchmarkConfig) -> Result<Stats, RunError>;
}

pub struct HttpLoadGenerator<P = NoProgress> {
    process: Arc<P>,
}

impl HttpLoadGenerator {
    pub fn new() -> Self {
        Self {
            process: Arc::new(NoProgress),
        }
    }
}

impl Default for HttpLoadGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Process + 'static> HttpLoadGenerator<P> {
    pub fn with_progress<Q: Process + 'static>(self, process: Q) -> HttpLoadGenerator<Q> {
        HttpLoadGenerator {
            process: Arc::new(process),
        }
    }

    async fn run_with<C>(
        &self,
        config: &BenchmarkConfig,
        make_connector: impl Fn() -> C,
        addr: SocketAddr,
    ) -> Result<Stats, RunError>
    where
        C: Connector + 'static,
    {
        let connections = config.connections();
        let (tx, rx) = channel(EVENTS_PER_CONNECTION * connections.min(1024) as usize);
        let request = codec::encode_request(config);
        let expects_body = *config.method() != Method::HEAD;
        let pipelining = usize::try_from(config.pipelining()).unwrap_or(usize::MAX);

        info!(
            url = %config.url(),
            connections,
            duration_secs = config.duration().as_secs(),
            pipelining,
            "starting run"
        );
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + config.duration();

        let samples = Samples::new()?;
        let process = self.process.clone();
        let duration = config.duration();
        let collector = tokio::spawn(async move {
            collect(rx, samples, start, duration, process.as_ref()).await
        });

        let mut workers = Vec::with_capacity(usize::try_from(connections).unwrap_or_default());
        for id in 0..connections {
            let settings = ConnectionSettings {
                id,
                request: request.clone(),
                pipelining,
                expects_body,
                deadline,
            };
            workers.push(tokio::spawn(connection_task(
                make_connector(),
                settings,
                tx.clone(),
            )));
        }
        drop(tx);

        let mut connect_failures = Vec::new();
        for worker in workers {
            if let Err(e) = worker.await? {
                connect_failures.push(e);
            }
        }
        let samples = collector.await?;
        let finished_at = Utc::now();

        if connect_failures.len() as u64 == connections {
            let source = connect_failures.swap_remove(0);
            return Err(RunError::Connect { addr, source });
        }

        let mut stats = Stats::from_samples(config, samples, started_at, finished_at);
        stats.errors += connect_failures.len() as u64;
        info!(
            requests = stats.requests.total,
            errors = stats.errors,
            "run finished"
        );
        Ok(stats)
    }
}

#[async_trait]
impl<P: Process + 'static> LoadGenerator for HttpLoadGenerator<P> {
    async fn run(&self, config: &BenchmarkConfig) -> Result<Stats, RunError> {
        config.validate()?;
        let addr = resolve(config).await?;
        debug!(%addr, "resolved target");
        self.run_with(config, || TcpConnector::new(addr), addr).await
    }
}

/// First address of the target, IPv4 preferred.
async fn resolve(config: &BenchmarkConfig) -> Result<SocketAddr, RunError> {
    let host = config.authority();
    let addrs: Vec<SocketAddr> = lookup_host(host.as_str())
        .await
        .map_err(|source| RunError::Resolve {
            host: host.clone(),
            source,
        })?
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or(RunError::NoAddress { host })
}
