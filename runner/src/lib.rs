//! Running external commands for the agent.
//!
//! Every command runs as the leader of its own process group, so anything it forks can be
//! stopped along with it. This crate provides:
//! - [`Command`], the description of what to run
//! - [`CmdRunner`] with the real [`ExecCmdRunner`], to run a command to completion or start it
//! - [`Process`], a handle to a running group with [`Process::wait`] and
//!   [`Process::terminate_nicely`]
//! - [`ExecResult`] and [`CmdError`], the single outcome of every invocation
//! - [`wait::poll_until`], the bounded wait used wherever the agent polls for a condition

extern crate alloc;
extern crate core;

mod command;
#[cfg(any(test, feature = "test-fakes"))]
pub mod fakes;
pub mod groups;
pub mod path;
mod process;
mod result;
mod runner;
pub mod wait;

pub use command::Command;
pub use groups::{EscalationSignals, ProcessGroups, UnixProcessGroups};
pub use process::{KILL_REAP_TIMEOUT, LaunchError, Process, ProcessState};
pub use result::{CmdError, ExecResult, NO_EXIT_STATUS, SIGNAL_EXIT_OFFSET};
pub use runner::{CmdRunner, ExecCmdRunner};
