//! Machine configuration on behalf of the control plane.
//!
//! [`Platform`] decides which commands to run and which files to write; every command goes
//! through a [`CmdRunner`] and every absolute path is resolved under the configured root.

mod disk;
mod hostname;
mod logrotate;
mod monit;
mod ntp;
mod secrets;
mod ssh;
mod tmp;
mod users;

use core::time::Duration;
use std::path::{Component, Path, PathBuf};

use eyre::{Result, WrapErr as _};
use tokio::fs;
use vmagent_runner::{CmdRunner, ExecResult};

use crate::config::AgentConfig;

pub use monit::MonitCredentials;
pub use ntp::NtpInfo;
pub use users::EPHEMERAL_USER_PREFIX;

/// Operations on the local machine.
#[derive(Debug)]
pub struct Platform<R> {
    runner: R,
    root: PathBuf,
    base_dir: PathBuf,
    disk_wait_timeout: Duration,
}

impl<R: CmdRunner> Platform<R> {
    #[must_use]
    pub fn new(runner: R, config: &AgentConfig) -> Self {
        Self {
            runner,
            root: config.paths.root.clone(),
            base_dir: config.paths.base_dir.clone(),
            disk_wait_timeout: config.disks.wait_timeout(),
        }
    }

    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Maps an absolute machine path to where it lives under the configured root.
    fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let relative: PathBuf = path
            .as_ref()
            .components()
            .filter(|c| !matches!(*c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }

    /// A path inside the agent's base directory, resolved under the root.
    fn base_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.resolve(self.base_dir.join(relative))
    }

    /// Runs `name` and turns a failed result into an error carrying `context`.
    async fn run(&self, context: &'static str, name: &str, args: &[&str]) -> Result<ExecResult> {
        self.runner
            .run_command(name, args)
            .await
            .into_result()
            .wrap_err(context)
    }
}

/// Writes `contents` to `path`, creating missing parent directories.
async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .wrap_err_with(|| format!("Creating directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .await
        .wrap_err_with(|| format!("Writing to {}", path.display()))
}
