//! YAML configuration for a controller link.
//!
//! ```yaml
//! link:
//!   kind: serial
//!   path: /dev/ttyUSB0
//!   baud_rate: 9600
//! timeouts:
//!   vend: 20000
//!   read-door: 500
//! poll:
//!   max_channel: 48
//!   inter_channel_delay_ms: 25
//! ```
//!
//! Every section is optional.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vmc_protocol::Operation;

use crate::controller::{timeout_from_millis, TimeoutTable};
use crate::poller::{PollOptions, DEFAULT_MAX_CHANNEL};
use crate::serial::{SerialTransport, TcpTransport, DEFAULT_BAUD_RATE};
use crate::simulator::SimulatedBoard;
use crate::transport::Transport;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid YAML for this schema.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A timeout override names no catalog operation.
    #[error("unknown operation in timeouts: {0}")]
    UnknownOperation(String),

    /// A timeout is zero, negative or not finite.
    #[error("invalid timeout for {name}: {millis} ms")]
    InvalidTimeout {
        /// Operation or setting name.
        name: String,
        /// Rejected value.
        millis: f64,
    },
}

/// Which link to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LinkConfig {
    /// Local UART.
    Serial {
        /// Device path.
        path: String,
        /// Baud rate.
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// UART-over-TCP bridge.
    Tcp {
        /// `host:port` of the bridge.
        address: String,
    },
    /// In-process simulated board.
    Simulated {
        /// Number of fitted channels, starting at 1.
        #[serde(default = "default_simulated_channels")]
        channels: u8,
    },
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_simulated_channels() -> u8 {
    DEFAULT_MAX_CHANNEL as u8
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::Serial {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl LinkConfig {
    /// Build the configured transport.
    pub fn build(&self) -> Box<dyn Transport> {
        match self {
            LinkConfig::Serial { path, baud_rate } => {
                Box::new(SerialTransport::new(path.clone(), *baud_rate))
            }
            LinkConfig::Tcp { address } => Box::new(TcpTransport::new(address.clone())),
            LinkConfig::Simulated { channels } => {
                Box::new(SimulatedBoard::with_channels(1..=*channels))
            }
        }
    }
}

/// Channel scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Highest channel probed; clamped to `1..=80` at scan time.
    pub max_channel: i64,
    /// Pause between probes.
    pub inter_channel_delay_ms: u64,
    /// Reply timeout per probe.
    pub per_request_timeout_ms: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            max_channel: DEFAULT_MAX_CHANNEL,
            inter_channel_delay_ms: 50,
            per_request_timeout_ms: 1000.0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Link selection.
    pub link: LinkConfig,
    /// Per-operation timeout overrides in milliseconds, keyed by operation name.
    pub timeouts: BTreeMap<String, f64>,
    /// Channel scan settings.
    pub poll: PollConfig,
}

impl ControllerConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check timeout names and values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeout_table()?;
        self.poll_options()?;
        Ok(())
    }

    /// Timeout table with the configured overrides applied.
    pub fn timeout_table(&self) -> Result<TimeoutTable, ConfigError> {
        let mut table = TimeoutTable::new();
        for (name, &millis) in &self.timeouts {
            let operation = Operation::from_name(name)
                .ok_or_else(|| ConfigError::UnknownOperation(name.clone()))?;
            let timeout = timeout_from_millis(millis).map_err(|_| ConfigError::InvalidTimeout {
                name: name.clone(),
                millis,
            })?;
            table
                .set(operation, timeout)
                .map_err(|_| ConfigError::InvalidTimeout {
                    name: name.clone(),
                    millis,
                })?;
        }
        Ok(table)
    }

    /// Scan options from the `poll` section.
    pub fn poll_options(&self) -> Result<PollOptions, ConfigError> {
        let per_request_timeout = timeout_from_millis(self.poll.per_request_timeout_ms)
            .map_err(|_| ConfigError::InvalidTimeout {
                name: "poll.per_request_timeout_ms".to_string(),
                millis: self.poll.per_request_timeout_ms,
            })?;
        Ok(PollOptions {
            max_channel: self.poll.max_channel,
            inter_channel_delay: Duration::from_millis(self.poll.inter_channel_delay_ms),
            per_request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ControllerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());

        let options = config.poll_options().unwrap();
        assert_eq!(options, PollOptions::default());
        assert_eq!(
            config.timeout_table().unwrap().get(Operation::Vend),
            Duration::from_millis(15_000)
        );
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
link:
  kind: tcp
  address: "10.0.0.7:4001"
timeouts:
  vend: 20000
  read-door: 250
poll:
  max_channel: 48
  inter_channel_delay_ms: 10
"#;
        let config = ControllerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.link,
            LinkConfig::Tcp {
                address: "10.0.0.7:4001".to_string()
            }
        );

        let table = config.timeout_table().unwrap();
        assert_eq!(table.get(Operation::Vend), Duration::from_secs(20));
        assert_eq!(table.get(Operation::ReadDoor), Duration::from_millis(250));
        assert_eq!(table.get(Operation::SelfTest), Duration::from_secs(60));

        let options = config.poll_options().unwrap();
        assert_eq!(options.max_channel, 48);
        assert_eq!(options.inter_channel_delay, Duration::from_millis(10));
        assert_eq!(options.per_request_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_serial_baud_default() {
        let config =
            ControllerConfig::from_yaml_str("link:\n  kind: serial\n  path: /dev/ttyS3\n").unwrap();
        assert_eq!(
            config.link,
            LinkConfig::Serial {
                path: "/dev/ttyS3".to_string(),
                baud_rate: 9600
            }
        );
    }

    #[test]
    fn test_simulated_link_builds() {
        let config = ControllerConfig::from_yaml_str("link:\n  kind: simulated\n").unwrap();
        assert_eq!(config.link, LinkConfig::Simulated { channels: 60 });
        let transport = config.link.build();
        assert!(!transport.is_open());
        assert_eq!(transport.describe(), "simulated");
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let err = ControllerConfig::from_yaml_str("timeouts:\n  dispense: 100\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperation(name) if name == "dispense"));
    }

    #[test]
    fn test_bad_timeouts_rejected() {
        let err = ControllerConfig::from_yaml_str("timeouts:\n  vend: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        let err = ControllerConfig::from_yaml_str("timeouts:\n  vend: -5\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        let err = ControllerConfig::from_yaml_str("timeouts: { vend: 1.0e+300 }\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { name, .. } if name == "vend"));

        let err = ControllerConfig::from_yaml_str("poll:\n  per_request_timeout_ms: 1.0e+300\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        let err =
            ControllerConfig::from_yaml_str("poll:\n  per_request_timeout_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { name, .. } if name.starts_with("poll")));
    }
}
