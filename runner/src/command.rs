//! Description of an external command to run.

use core::fmt;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// What to run: executable, arguments, environment overlay, working directory and stdin.
///
/// Built by value and never mutated once handed to a runner; every execution works
/// from its own copy of the fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    stdin: Option<String>,
}

impl Command {
    /// Starts a descriptor for the executable `name` (looked up on `PATH` unless it contains a `/`).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments in order.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overlays a variable onto the inherited environment. Later values for the same key win.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Overlays several variables onto the inherited environment.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Runs the command in `dir` instead of the agent's current directory.
    /// An empty path keeps the inherited directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.working_dir = (!dir.as_os_str().is_empty()).then_some(dir);
        self
    }

    /// Feeds `input` to the process's stdin, which is closed afterwards.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    #[must_use]
    pub fn get_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub const fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    #[must_use]
    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    #[must_use]
    pub fn get_stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

/// Renders the command line the way it appears in error messages: name and arguments joined by spaces.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
