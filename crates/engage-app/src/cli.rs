//! CLI argument definitions for the Engage server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use engage_core::config::{BackendKind, EngageConfig};
use engage_core::error::EngageError;
use std::path::{Path, PathBuf};

/// Engage - patient-engagement chat console backed by a generative model.
#[derive(Parser, Debug)]
#[command(name = "engage", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Chat backend: gemini or remote.
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<BackendKind>,
}

impl CliArgs {
    /// Priority: --config flag > ENGAGE_CONFIG env var > ~/.engage/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ENGAGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port flag > ENGAGE_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("ENGAGE_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    pub fn resolve_backend(&self, config_kind: BackendKind) -> BackendKind {
        self.backend.unwrap_or(config_kind)
    }
}

/// Load the config file, falling back to defaults. The error is handed back
/// so it can be logged once the subscriber is installed.
pub fn load_config(path: &Path) -> (EngageConfig, Option<EngageError>) {
    match EngageConfig::load(path) {
        Ok(config) => (config, None),
        Err(e) => (EngageConfig::default(), Some(e)),
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".engage").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "engage",
            "--config",
            "/tmp/engage.toml",
            "-p",
            "4000",
            "--log-level",
            "debug",
            "--backend",
            "remote",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/engage.toml"));
        assert_eq!(args.resolve_port(3030), 4000);
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert_eq!(args.resolve_backend(BackendKind::Gemini), BackendKind::Remote);
    }

    #[test]
    fn test_defaults_fall_through_to_config() {
        let args = CliArgs::parse_from(["engage"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert_eq!(args.resolve_backend(BackendKind::Gemini), BackendKind::Gemini);
    }

    #[test]
    fn test_load_config_reports_failures() {
        let dir = tempfile::tempdir().unwrap();

        let (config, err) = load_config(&dir.path().join("missing.toml"));
        assert_eq!(config.general.port, 3030);
        assert!(matches!(err, Some(EngageError::Io(_))));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[general\nport = ").unwrap();
        let (config, err) = load_config(&broken);
        assert_eq!(config.general.port, 3030);
        assert!(matches!(err, Some(EngageError::Config(_))));

        let good = dir.path().join("engage.toml");
        std::fs::write(&good, "[general]\nport = 4100\n").unwrap();
        let (config, err) = load_config(&good);
        assert_eq!(config.general.port, 4100);
        assert!(err.is_none());
    }

    #[test]
    fn test_bad_backend_rejected() {
        assert!(CliArgs::try_parse_from(["engage", "--backend", "carrier-pigeon"]).is_err());
    }
}
