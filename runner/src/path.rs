//! Executable lookup on `PATH`, similar to the shell's `command -v`.

use std::{env, path::PathBuf};

use crate::command::Command;

/// Resolves `name` to an executable file using the agent's own `PATH`.
///
/// Names containing a `/` are taken as paths and only checked.
#[must_use]
pub fn lookup(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    which::which(name).ok()
}

/// Resolves the executable of `cmd` the way the OS will when it is spawned: against the
/// `PATH` overlaid on the descriptor if there is one, relative names from its working dir.
#[must_use]
pub fn lookup_for(cmd: &Command) -> Option<PathBuf> {
    let name = cmd.get_name();
    if name.is_empty() {
        return None;
    }
    let cwd = match cmd.get_working_dir() {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().ok()?,
    };
    match cmd.get_env().get("PATH") {
        Some(search_path) => which::which_in(name, Some(search_path), cwd).ok(),
        None => which::which_in(name, env::var_os("PATH"), cwd).ok(),
    }
}
