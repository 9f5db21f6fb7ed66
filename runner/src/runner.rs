//! The runner facade: turns a [`Command`] into a [`Process`] or straight into an [`ExecResult`].

use alloc::sync::Arc;
use core::future::Future;

use tracing::debug;

use crate::{
    command::Command,
    groups::{EscalationSignals, ProcessGroups, UnixProcessGroups},
    path,
    process::{LaunchError, Process},
    result::{CmdError, ExecResult, NO_EXIT_STATUS},
};

/// Everything the rest of the agent needs to run external commands.
///
/// Implementations hold no per-invocation state, so one value can serve any number of
/// concurrent callers.
pub trait CmdRunner: Send + Sync {
    /// Launches `cmd` and awaits its single result.
    fn run_complex_command(&self, cmd: &Command) -> impl Future<Output = ExecResult> + Send;

    /// Launches `cmd` and returns right away with a handle to the running group.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] if no process could be started; it still converts
    /// into a finished handle with [`LaunchError::into_process`].
    fn run_complex_command_async(&self, cmd: &Command) -> Result<Process, LaunchError>;

    /// Whether `name` resolves to an executable. Never spawns anything.
    fn command_exists(&self, name: &str) -> bool;

    /// Runs `name` with `args` and nothing else configured.
    fn run_command(&self, name: &str, args: &[&str]) -> impl Future<Output = ExecResult> + Send {
        let cmd = Command::new(name).args(args.iter().copied());
        async move { self.run_complex_command(&cmd).await }
    }

    /// Like [`CmdRunner::run_command`], with `input` fed to stdin.
    fn run_command_with_input(
        &self,
        input: &str,
        name: &str,
        args: &[&str],
    ) -> impl Future<Output = ExecResult> + Send {
        let cmd = Command::new(name).args(args.iter().copied()).stdin(input);
        async move { self.run_complex_command(&cmd).await }
    }
}

/// [`CmdRunner`] that starts real OS processes, each in its own process group.
#[derive(Debug, Clone)]
pub struct ExecCmdRunner {
    groups: Arc<dyn ProcessGroups>,
    signals: EscalationSignals,
}

impl Default for ExecCmdRunner {
    fn default() -> Self {
        Self::new(Arc::new(UnixProcessGroups))
    }
}

impl ExecCmdRunner {
    #[must_use]
    pub fn new(groups: Arc<dyn ProcessGroups>) -> Self {
        Self {
            groups,
            signals: EscalationSignals::default(),
        }
    }

    /// Uses `signals` instead of `SIGTERM`/`SIGKILL` when terminating.
    #[must_use]
    pub const fn with_signals(mut self, signals: EscalationSignals) -> Self {
        self.signals = signals;
        self
    }

    #[must_use]
    pub const fn signals(&self) -> EscalationSignals {
        self.signals
    }
}

impl CmdRunner for ExecCmdRunner {
    async fn run_complex_command(&self, cmd: &Command) -> ExecResult {
        let mut process = match self.run_complex_command_async(cmd) {
            Ok(process) => process,
            Err(e) => {
                debug!(command = %cmd, "Launch failed: {e}");
                return ExecResult::launch_failure(e.into_inner());
            }
        };
        match process.wait().await {
            Ok(result) => result,
            Err(_) => ExecResult {
                stdout: String::new(),
                stderr: String::new(),
                exit_status: NO_EXIT_STATUS,
                error: Some(CmdError::Abandoned {
                    command: cmd.to_string(),
                }),
            },
        }
    }

    fn run_complex_command_async(&self, cmd: &Command) -> Result<Process, LaunchError> {
        Process::launch(cmd, Arc::clone(&self.groups), self.signals)
    }

    fn command_exists(&self, name: &str) -> bool {
        path::lookup(name).is_some()
    }
}
