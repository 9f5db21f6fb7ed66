//! Outcome of a finished invocation and the errors the runner reports.

use std::io;

use nix::errno::Errno;
use thiserror::Error as ThisError;

/// Exit status reported when the process never started or its status could not be obtained.
pub const NO_EXIT_STATUS: i32 = -1;

/// Offset added to a signal number when a process died from that signal, as shells report it.
pub const SIGNAL_EXIT_OFFSET: i32 = 128;

/// Everything known about a command once it is done.
///
/// Produced exactly once per invocation. `error` is `None` only for a clean
/// zero-status completion.
#[derive(Debug)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
    pub error: Option<CmdError>,
}

impl ExecResult {
    /// A result for a command that never got to run.
    #[must_use]
    pub const fn launch_failure(error: CmdError) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_status: NO_EXIT_STATUS,
            error: Some(error),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Splits off the error so callers can use `?`.
    ///
    /// # Errors
    ///
    /// Returns the recorded error for anything but a clean zero-status exit.
    pub fn into_result(self) -> Result<Self, CmdError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Why a command failed, or why controlling it failed.
#[derive(Debug, ThisError)]
pub enum CmdError {
    #[error("Running command: refusing to run a command with an empty name")]
    EmptyName,
    #[error("Running command: '{command}': command not found")]
    NotFound { command: String },
    #[error("Running command: '{command}': failed to start")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Running command: '{command}', stdout: '{stdout}', stderr: '{stderr}': exit status {status}")]
    NonZeroExit {
        command: String,
        stdout: String,
        stderr: String,
        status: i32,
    },
    #[error("Running command: '{command}', stdout: '{stdout}', stderr: '{stderr}': terminated by signal {signal}")]
    Signaled {
        command: String,
        stdout: String,
        stderr: String,
        signal: String,
    },
    #[error("Running command: '{command}': collecting the process status failed")]
    Collect {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Running command: '{command}': the result was never delivered")]
    Abandoned { command: String },
    #[error("Signaling process group {pgid} with {signal}")]
    SignalGroup {
        pgid: u32,
        signal: String,
        #[source]
        source: Errno,
    },
    #[error("Process group {pgid} was still not reaped {waited_ms}ms after {signal}")]
    NotReaped {
        pgid: u32,
        signal: String,
        waited_ms: u128,
    },
}

impl CmdError {
    /// Whether the command never got a process group.
    #[must_use]
    pub const fn is_launch_failure(&self) -> bool {
        matches!(
            *self,
            Self::EmptyName | Self::NotFound { .. } | Self::Spawn { .. }
        )
    }
}
