use std::{str::FromStr, time::Duration};

use hyper::{Method, Uri};

use crate::error::ConfigError;

pub const DEFAULT_URL: &str = "http://localhost:1337/movies";
pub const DEFAULT_CONNECTIONS: u64 = 100;
pub const DEFAULT_DURATION_SECS: u64 = 10;
pub const DEFAULT_PIPELINING: u64 = 10;

pub const MAX_CONNECTIONS: u64 = 65_535;
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;
pub const MAX_PIPELINING: u64 = 1024;

const DEFAULT_HTTP_PORT: u16 = 80;

/// One benchmark run against a single URL.
///
/// Built through [`BenchmarkConfig::builder`], which validates before handing
/// the config out. Fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub(crate) url: Uri,
    pub(crate) connections: u64,
    pub(crate) duration: Duration,
    pub(crate) pipelining: u64,
    pub(crate) method: Method,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            url: Uri::from_static(DEFAULT_URL),
            connections: DEFAULT_CONNECTIONS,
            duration: Duration::from_secs(DEFAULT_DURATION_SECS),
            pipelining: DEFAULT_PIPELINING,
            method: Method::GET,
        }
    }
}

impl BenchmarkConfig {
    pub fn builder() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder {
            config: BenchmarkConfig::default(),
        }
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn pipelining(&self) -> u64 {
        self.pipelining
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        if self.duration.as_secs() == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if self.pipelining == 0 {
            return Err(ConfigError::ZeroPipelining);
        }
        if self.connections > MAX_CONNECTIONS {
            return Err(ConfigError::TooManyConnections {
                got: self.connections,
                max: MAX_CONNECTIONS,
            });
        }
        if self.duration.as_secs() > MAX_DURATION_SECS {
            return Err(ConfigError::DurationTooLong {
                got: self.duration.as_secs(),
                max: MAX_DURATION_SECS,
            });
        }
        if self.pipelining > MAX_PIPELINING {
            return Err(ConfigError::PipeliningTooLarge {
                got: self.pipelining,
                max: MAX_PIPELINING,
            });
        }
        match self.url.scheme_str() {
            Some("http") => {}
            other => {
                return Err(ConfigError::UnsupportedScheme(
                    other.unwrap_or_default().to_string(),
                ))
            }
        }
        if self.url.host().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingHost(self.url.to_string()));
        }
        Ok(())
    }

    /// `host:port` of the target, with the scheme's default port filled in.
    pub fn authority(&self) -> String {
        let host = self.url.host().unwrap_or_default();
        let port = self.url.port_u16().unwrap_or(DEFAULT_HTTP_PORT);
        format!("{host}:{port}")
    }

    /// Value for the `Host` header; the port is only included when explicit.
    pub fn host_header(&self) -> String {
        match self.url.authority() {
            Some(authority) => authority.as_str().to_string(),
            None => String::new(),
        }
    }

    pub fn path_and_query(&self) -> &str {
        self.url
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
    }
}

pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    pub fn url(mut self, url: Uri) -> Self {
        self.config.url = url;
        self
    }

    pub fn connections(mut self, connections: u64) -> Self {
        self.config.connections = connections;
        self
    }

    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.config.duration = Duration::from_secs(secs);
        self
    }

    pub fn pipelining(mut self, pipelining: u64) -> Self {
        self.config.pipelining = pipelining;
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.config.method = method;
        self
    }

    pub fn build(self) -> Result<BenchmarkConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

pub fn build_uri(s: &str) -> Result<Uri, ConfigError> {
    Uri::from_str(s).map_err(|e| ConfigError::InvalidUrl {
        url: s.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_method(s: &str) -> Result<Method, ConfigError> {
    let upper = s.to_ascii_uppercase();
    let candidate = match upper.as_str() {
        "GET" | "HEAD" | "POST" | "PUT" | "DELETE" | "PATCH" | "OPTIONS" | "TRACE" => upper.as_str(),
        _ => s,
    };
    Method::from_bytes(candidate.as_bytes()).map_err(|_| ConfigError::InvalidMethod(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_local_movies_service() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.url().to_string(), "http://localhost:1337/movies");
        assert_eq!(config.connections(), 100);
        assert_eq!(config.duration(), Duration::from_secs(10));
        assert_eq!(config.pipelining(), 10);
        assert_eq!(config.method(), &Method::GET);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_connections() {
        let result = BenchmarkConfig::builder().connections(0).build();
        assert_eq!(result, Err(ConfigError::ZeroConnections));
    }

    #[test]
    fn rejects_zero_duration() {
        let result = BenchmarkConfig::builder().duration_secs(0).build();
        assert_eq!(result, Err(ConfigError::ZeroDuration));
    }

    #[test]
    fn rejects_zero_pipelining() {
        let result = BenchmarkConfig::builder().pipelining(0).build();
        assert_eq!(result, Err(ConfigError::ZeroPipelining));
    }

    #[test]
    fn rejects_values_past_the_upper_bounds() {
        let connections = BenchmarkConfig::builder().connections(u64::MAX).build();
        assert_eq!(
            connections,
            Err(ConfigError::TooManyConnections {
                got: u64::MAX,
                max: MAX_CONNECTIONS
            })
        );

        let pipelining = BenchmarkConfig::builder().pipelining(u64::MAX).build();
        assert_eq!(
            pipelining,
            Err(ConfigError::PipeliningTooLarge {
                got: u64::MAX,
                max: MAX_PIPELINING
            })
        );

        let duration = BenchmarkConfig::builder().duration_secs(u64::MAX).build();
        assert_eq!(
            duration,
            Err(ConfigError::DurationTooLong {
                got: u64::MAX,
                max: MAX_DURATION_SECS
            })
        );

        let at_limits = BenchmarkConfig::builder()
            .connections(MAX_CONNECTIONS)
            .pipelining(MAX_PIPELINING)
            .duration_secs(MAX_DURATION_SECS)
            .build();
        assert!(at_limits.is_ok());
    }

    #[test]
    fn rejects_https_and_relative_urls() {
        let https = BenchmarkConfig::builder()
            .url(build_uri("https://example.com/").expect("valid uri"))
            .build();
        assert_eq!(https, Err(ConfigError::UnsupportedScheme("https".into())));

        let relative = BenchmarkConfig::builder()
            .url(build_uri("/movies").expect("valid uri"))
            .build();
        assert_eq!(relative, Err(ConfigError::UnsupportedScheme(String::new())));
    }

    #[test]
    fn authority_fills_default_port() {
        let config = BenchmarkConfig::builder()
            .url(build_uri("http://example.com/a?b=c").expect("valid uri"))
            .build()
            .expect("valid config");
        assert_eq!(config.authority(), "example.com:80");
        assert_eq!(config.host_header(), "example.com");
        assert_eq!(config.path_and_query(), "/a?b=c");

        let default = BenchmarkConfig::default();
        assert_eq!(default.authority(), "localhost:1337");
        assert_eq!(default.host_header(), "localhost:1337");
    }

    #[test]
    fn empty_path_becomes_root() {
        let config = BenchmarkConfig::builder()
            .url(build_uri("http://example.com").expect("valid uri"))
            .build()
            .expect("valid config");
        assert_eq!(config.path_and_query(), "/");
    }

    #[test]
    fn unparsable_url_is_reported() {
        assert!(matches!(
            build_uri("http://exa mple.com"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn methods_are_case_insensitive() {
        assert_eq!(parse_method("get"), Ok(Method::GET));
        assert_eq!(parse_method("Post"), Ok(Method::POST));
        assert_eq!(parse_method("PURGE").map(|m| m.to_string()), Ok("PURGE".into()));
        assert_eq!(
            parse_method("NOT A VERB"),
            Err(ConfigError::InvalidMethod("NOT A VERB".into()))
        );
    }
}
