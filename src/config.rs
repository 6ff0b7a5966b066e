use std::path::Path;

use anyhow::{Context, Result};
use benchmark::{build_uri, parse_method, BenchmarkConfig};
use serde::Deserialize;

use crate::args::Args;

/// Run settings as written in a TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub connections: Option<u64>,
    pub duration: Option<u64>,
    pub pipelining: Option<u64>,
    pub method: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Flags win over the file, the file wins over the built-in defaults.
pub fn build_config(args: &Args, file: FileConfig) -> Result<BenchmarkConfig> {
    let mut builder = BenchmarkConfig::builder();

    if let Some(url) = args.url.as_ref().or(file.url.as_ref()) {
        builder = builder.url(build_uri(url)?);
    }
    if let Some(connections) = args.connections.or(file.connections) {
        builder = builder.connections(connections);
    }
    if let Some(duration) = args.duration.or(file.duration) {
        builder = builder.duration_secs(duration);
    }
    if let Some(pipelining) = args.pipelining.or(file.pipelining) {
        builder = builder.pipelining(pipelining);
    }
    if let Some(method) = args.method.as_ref().or(file.method.as_ref()) {
        builder = builder.method(parse_method(method)?);
    }

    Ok(builder.build()?)
}

pub fn load_config(args: &Args) -> Result<BenchmarkConfig> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    build_config(args, file)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use benchmark::ConfigError;
    use clap::Parser;

    use super::*;

    fn args(flags: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("http-bench").chain(flags.iter().copied()))
            .expect("valid flags")
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let config = build_config(&args(&[]), FileConfig::default()).expect("valid");
        assert_eq!(config, BenchmarkConfig::default());
    }

    #[test]
    fn flags_override_file_and_file_overrides_defaults() {
        let file = FileConfig {
            url: Some("http://10.0.0.1:8080/movie-list".into()),
            connections: Some(4),
            duration: Some(2),
            pipelining: None,
            method: Some("head".into()),
        };
        let config = build_config(&args(&["-c", "16"]), file).expect("valid");

        assert_eq!(config.url().to_string(), "http://10.0.0.1:8080/movie-list");
        assert_eq!(config.connections(), 16);
        assert_eq!(config.duration().as_secs(), 2);
        assert_eq!(config.pipelining(), 10);
        assert_eq!(config.method().as_str(), "HEAD");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = FileConfig {
            connections: Some(0),
            ..Default::default()
        };
        let err = build_config(&args(&[]), file).expect_err("zero connections");
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::ZeroConnections)
        );

        let err = build_config(&args(&["-u", "ftp://example.com/"]), FileConfig::default())
            .expect_err("ftp url");
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::UnsupportedScheme("ftp".into()))
        );
    }

    #[test]
    fn oversized_counts_are_config_errors() {
        let err = build_config(&args(&["-c", "18446744073709551615"]), FileConfig::default())
            .expect_err("too many connections");
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::TooManyConnections { .. })
        ));

        let err = build_config(&args(&["-p", "100000"]), FileConfig::default())
            .expect_err("pipelining too large");
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::PipeliningTooLarge { .. })
        ));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "url = \"http://localhost:8080/movies\"\nconnections = 3\npipelining = 1"
        )
        .expect("write config");

        let loaded = FileConfig::load(file.path()).expect("valid toml");
        assert_eq!(
            loaded,
            FileConfig {
                url: Some("http://localhost:8080/movies".into()),
                connections: Some(3),
                pipelining: Some(1),
                ..Default::default()
            }
        );

        let path = file.path().to_string_lossy().into_owned();
        let config = load_config(&args(&["--config", &path, "-d", "1"])).expect("valid");
        assert_eq!(config.connections(), 3);
        assert_eq!(config.duration().as_secs(), 1);
    }

    #[test]
    fn unknown_keys_and_missing_files_are_errors() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "conections = 3").expect("write config");
        assert!(FileConfig::load(file.path()).is_err());

        let missing = load_config(&args(&["--config", "/definitely/not/here.toml"]));
        let message = format!("{:#}", missing.expect_err("missing file"));
        assert!(message.contains("Failed to read config file"));
    }
}
