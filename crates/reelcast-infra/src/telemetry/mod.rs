//! Tracing initialisation
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a fmt layer. The
//! filter comes from `RUST_LOG` when set, otherwise from [`TelemetryConfig::default_filter`].

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};

use std::str::FromStr;

pub const DEFAULT_FILTER: &str = "reelcast=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "pretty" | "text" | "human" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub environment: String,
    pub format: LogFormat,
    pub default_filter: String,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            environment: environment.into(),
            format: LogFormat::default(),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    /// Reads `LOG_FORMAT`. An unrecognised value falls back to the human format.
    pub fn from_env(service_name: impl Into<String>, environment: impl Into<String>) -> Self {
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        Self {
            format,
            ..Self::new(service_name, environment)
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = TelemetryConfig::new("reelcast", "test").with_format(LogFormat::Json);
        assert_eq!(config.default_filter, DEFAULT_FILTER);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.service_name, "reelcast");
    }
}
