//! Reading the configuration file from disk.

use std::{io, path::Path};

use tokio::fs;
use tracing::debug;

use crate::config::{AgentConfig, ConfigError};

/// Reads and parses the agent config from a TOML file.
///
/// A file that does not exist yields [`AgentConfig::default`]. The termination signals are
/// validated here so a bad name fails at startup rather than at the first termination.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, is not valid TOML for
/// [`AgentConfig`], or names an unknown signal.
pub async fn load<P: AsRef<Path>>(path: P) -> Result<AgentConfig, ConfigError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(AgentConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let config: AgentConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.termination.signals()?;
    Ok(config)
}
