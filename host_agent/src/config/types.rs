//! Configuration data types for the agent.

use core::time::Duration;
use std::{io, path::PathBuf};

use serde::Deserialize;
use thiserror::Error as ThisError;
use vmagent_runner::EscalationSignals;

/// Everything the agent reads from its configuration file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub disks: DisksConfig,
    #[serde(default)]
    pub termination: TerminationConfig,
}

/// Where the platform layer reads and writes.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Filesystem root every absolute path is resolved under. Only tests move this away from `/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// The agent's base directory, holding `agent/` and `monit/`.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            base_dir: default_base_dir(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("/var/vcap")
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DisksConfig {
    /// How long to wait for a device node to show up.
    #[serde(default = "default_disk_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl DisksConfig {
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for DisksConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_disk_wait_timeout_secs(),
        }
    }
}

const fn default_disk_wait_timeout_secs() -> u64 {
    60
}

/// Signals and grace period used when the agent stops a command.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TerminationConfig {
    #[serde(default = "default_polite_signal")]
    pub polite_signal: String,
    #[serde(default = "default_forceful_signal")]
    pub forceful_signal: String,
    /// Grace period between the polite and the forceful signal.
    #[serde(default = "default_termination_timeout_secs")]
    pub timeout_secs: u64,
}

impl TerminationConfig {
    /// Parses the configured signal names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Signal`] if either name is not a known signal.
    pub fn signals(&self) -> Result<EscalationSignals, ConfigError> {
        EscalationSignals::from_names(&self.polite_signal, &self.forceful_signal)
            .map_err(ConfigError::Signal)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            polite_signal: default_polite_signal(),
            forceful_signal: default_forceful_signal(),
            timeout_secs: default_termination_timeout_secs(),
        }
    }
}

fn default_polite_signal() -> String {
    "SIGTERM".to_owned()
}

fn default_forceful_signal() -> String {
    "SIGKILL".to_owned()
}

const fn default_termination_timeout_secs() -> u64 {
    60
}

/// Why the configuration could not be used.
#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Failed to read config file at: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config as TOML at: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid termination signal in config: {0}")]
    Signal(String),
}
