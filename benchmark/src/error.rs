use std::{io, net::SocketAddr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme {0:?}, only http is supported")]
    UnsupportedScheme(String),
    #[error("url {0:?} has no host")]
    MissingHost(String),
    #[error("invalid http method {0:?}")]
    InvalidMethod(String),
    #[error("connections must be greater than 0")]
    ZeroConnections,
    #[error("duration must be greater than 0 seconds")]
    ZeroDuration,
    #[error("pipelining factor must be at least 1")]
    ZeroPipelining,
    #[error("at most {max} connections are supported, got {got}")]
    TooManyConnections { got: u64, max: u64 },
    #[error("duration must be at most {max} seconds, got {got}")]
    DurationTooLong { got: u64, max: u64 },
    #[error("pipelining factor must be at most {max}, got {got}")]
    PipeliningTooLarge { got: u64, max: u64 },
}

/// Why a run produced no statistics.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("{host} did not resolve to any address")]
    NoAddress { host: String },
    #[error("connect {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
    #[error("benchmark task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("connection closed with {0} requests in flight")]
    Closed(usize),
    #[error("response received with no request in flight")]
    Unsolicited,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("malformed status line")]
    StatusLine,
    #[error("malformed header line")]
    Header,
    #[error("invalid content-length")]
    ContentLength,
    #[error("malformed chunk")]
    Chunk,
}
