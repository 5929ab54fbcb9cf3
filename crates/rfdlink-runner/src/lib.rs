//! Ground-station runner support: configuration file, logging and console
//! output for the `rfdlink` binary.

pub mod console;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rfdlink_engine::{CommandConfig, ImageConfig, LinkError, PortSettings};
use rfdlink_protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path of the file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`GroundConfig`].
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// No serial port given on the command line or in the config file.
    #[error("no serial port configured (use --port or serial.port)")]
    MissingPort,

    /// Settings given on the command line are malformed.
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] ProtocolError),

    /// The link failed.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The log subscriber could not be installed.
    #[error("failed to install logging: {0}")]
    Logging(String),

    /// Installing the Ctrl-C handler failed.
    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type alias for the runner.
pub type Result<T> = std::result::Result<T, RunnerError>;

// ============================================================================
// Configuration
// ============================================================================

/// Serial section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path of the radio.
    pub port: Option<String>,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout; bounds every blocking read and loop shutdown.
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: None,
            baud_rate: 38_400,
            read_timeout_ms: 1_000,
        }
    }
}

/// Top-level configuration file.
///
/// ```yaml
/// serial:
///   port: /dev/ttyUSB0
///   baud_rate: 38400
/// command:
///   retry_interval_ms: 50
/// image:
///   image_dir: Images
///   ping_count: 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    /// Serial port settings.
    pub serial: SerialConfig,
    /// Command channel settings.
    pub command: CommandConfig,
    /// Image subsystem settings.
    pub image: ImageConfig,
}

impl GroundConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(GroundConfig::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|source| RunnerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serial settings, with `port` overriding the configured device.
    pub fn port_settings(&self, port: Option<&str>) -> Result<PortSettings> {
        let path = port
            .map(str::to_string)
            .or_else(|| self.serial.port.clone())
            .ok_or(RunnerError::MissingPort)?;
        Ok(PortSettings::new(path)
            .with_baud_rate(self.serial.baud_rate)
            .with_read_timeout(Duration::from_millis(self.serial.read_timeout_ms)))
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Default log filter for a `-v` count.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the verbosity flag.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| RunnerError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GroundConfig::from_yaml_str("").unwrap();
        assert_eq!(config, GroundConfig::default());
        assert_eq!(config.serial.baud_rate, 38_400);
    }

    #[test]
    fn test_port_override() {
        let config = GroundConfig::from_yaml_str("serial:\n  port: /dev/ttyUSB0\n").unwrap();
        assert_eq!(config.port_settings(None).unwrap().path, "/dev/ttyUSB0");
        assert_eq!(
            config.port_settings(Some("COM3")).unwrap().path,
            "COM3"
        );
        assert!(matches!(
            GroundConfig::default().port_settings(None),
            Err(RunnerError::MissingPort)
        ));
    }

    #[test]
    fn test_verbosity_filters() {
        assert_eq!(default_filter(0), "info");
        assert_eq!(default_filter(1), "debug");
        assert_eq!(default_filter(5), "trace");
    }

    #[test]
    fn test_second_logging_install_is_reported() {
        // The first install may succeed or not; either way a subscriber is
        // now global and a second install must be reported.
        let _ = init_logging(0);
        assert!(matches!(init_logging(1), Err(RunnerError::Logging(_))));
    }
}
