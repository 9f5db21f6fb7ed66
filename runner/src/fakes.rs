//! In-memory [`CmdRunner`] for testing code that runs commands.

use core::future::Future;
use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, PoisonError},
};

use crate::{
    command::Command,
    process::{LaunchError, Process},
    result::{CmdError, ExecResult},
    runner::CmdRunner,
};

/// What a faked command "printed" and how it "exited".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl FakeOutcome {
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn exit_status(exit_status: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_status,
        }
    }
}

/// Records every command it is asked to run and answers from a table of outcomes keyed by
/// the rendered command line. Unknown command lines succeed with empty output.
#[derive(Debug, Default)]
pub struct FakeCmdRunner {
    outcomes: Mutex<HashMap<String, FakeOutcome>>,
    missing: Mutex<HashSet<String>>,
    commands: Mutex<Vec<Command>>,
}

impl FakeCmdRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `command_line` (e.g. `"hostname web-0"`) with `outcome` from now on.
    pub fn add_outcome(&self, command_line: impl Into<String>, outcome: FakeOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command_line.into(), outcome);
    }

    /// Makes `name` unknown: [`CmdRunner::command_exists`] says no and launching it fails.
    pub fn remove_command(&self, name: impl Into<String>) {
        self.missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    /// Every command run so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered command lines of [`FakeCmdRunner::commands`].
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }

    fn answer(&self, cmd: &Command) -> Result<ExecResult, LaunchError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cmd.clone());

        if !self.command_exists(cmd.get_name()) {
            return Err(LaunchError::from(CmdError::NotFound {
                command: cmd.to_string(),
            }));
        }
        let command = cmd.to_string();
        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&command)
            .cloned()
            .unwrap_or_default();
        let error = (outcome.exit_status != 0).then(|| CmdError::NonZeroExit {
            command,
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
            status: outcome.exit_status,
        });
        Ok(ExecResult {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_status: outcome.exit_status,
            error,
        })
    }
}

impl CmdRunner for FakeCmdRunner {
    fn run_complex_command(&self, cmd: &Command) -> impl Future<Output = ExecResult> + Send {
        let result = self
            .answer(cmd)
            .unwrap_or_else(|e| ExecResult::launch_failure(e.into_inner()));
        async move { result }
    }

    fn run_complex_command_async(&self, cmd: &Command) -> Result<Process, LaunchError> {
        self.answer(cmd).map(Process::finished)
    }

    fn command_exists(&self, name: &str) -> bool {
        !name.is_empty()
            && !self
                .missing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(name)
    }
}
