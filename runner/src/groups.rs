//! OS primitives the runner needs for process groups: spawn into a fresh group,
//! signal the whole group, and make sense of a reaped status.
//!
//! The termination state machine in [`crate::process`] only talks to [`ProcessGroups`],
//! so signal numbering and group semantics stay in one implementation per platform.

use core::{fmt, str::FromStr as _};
use std::{io, os::unix::process::ExitStatusExt as _, process::ExitStatus};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tokio::process::{Child, Command as OsCommand};

use crate::result::{NO_EXIT_STATUS, SIGNAL_EXIT_OFFSET};

/// The two signals used when terminating a process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationSignals {
    /// Sent first; the process may trap it and shut down on its own terms.
    pub polite: Signal,
    /// Sent once the grace period is over; cannot be trapped.
    pub forceful: Signal,
}

impl Default for EscalationSignals {
    fn default() -> Self {
        Self {
            polite: Signal::SIGTERM,
            forceful: Signal::SIGKILL,
        }
    }
}

impl EscalationSignals {
    /// Builds the pair from signal names such as `SIGTERM` or `TERM`.
    ///
    /// # Errors
    ///
    /// Returns the offending name if it is not a known signal.
    pub fn from_names(polite: &str, forceful: &str) -> Result<Self, String> {
        Ok(Self {
            polite: parse_signal(polite)?,
            forceful: parse_signal(forceful)?,
        })
    }
}

fn parse_signal(name: &str) -> Result<Signal, String> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&full).map_err(|_| format!("Unknown signal: {name}"))
}

/// Whether a signal reached anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No process is left in the group; nothing to do.
    Gone,
}

/// How a reaped process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(Signal),
    /// The platform reported something we cannot decode.
    Unknown,
}

impl Termination {
    /// The single integer status callers see: the exit code, `128 + signal`, or `-1`.
    #[must_use]
    pub const fn exit_status(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(sig) => SIGNAL_EXIT_OFFSET + sig as i32,
            Self::Unknown => NO_EXIT_STATUS,
        }
    }
}

/// Capability interface over the process-group primitives of the host OS.
pub trait ProcessGroups: Send + Sync + fmt::Debug {
    /// Spawns `cmd` as the leader of a new process group whose id equals its pid.
    ///
    /// # Errors
    ///
    /// Whatever the OS reports when the process cannot be created.
    fn spawn(&self, cmd: &mut OsCommand) -> io::Result<Child>;

    /// Delivers `signal` to every process in group `pgid`.
    ///
    /// # Errors
    ///
    /// Any delivery failure other than the group being gone already.
    fn signal_group(&self, pgid: u32, signal: Signal) -> Result<Delivery, Errno>;

    /// Whether any process, zombies included, is still in group `pgid`.
    fn group_exists(&self, pgid: u32) -> bool;

    /// Interprets the status collected when the group leader was reaped.
    fn decode_status(&self, status: ExitStatus) -> Termination;
}

/// [`ProcessGroups`] for Unix, on top of `setpgid(0, 0)` at spawn and `killpg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessGroups;

impl ProcessGroups for UnixProcessGroups {
    fn spawn(&self, cmd: &mut OsCommand) -> io::Result<Child> {
        cmd.process_group(0).spawn()
    }

    fn signal_group(&self, pgid: u32, signal: Signal) -> Result<Delivery, Errno> {
        let raw = i32::try_from(pgid).map_err(|_| Errno::EINVAL)?;
        match signal::killpg(Pid::from_raw(raw), signal) {
            Ok(()) => Ok(Delivery::Sent),
            Err(Errno::ESRCH) => Ok(Delivery::Gone),
            Err(e) => Err(e),
        }
    }

    fn group_exists(&self, pgid: u32) -> bool {
        let Ok(raw) = i32::try_from(pgid) else {
            return false;
        };
        // EPERM still means somebody is in there.
        !matches!(signal::killpg(Pid::from_raw(raw), None), Err(Errno::ESRCH))
    }

    fn decode_status(&self, status: ExitStatus) -> Termination {
        if let Some(code) = status.code() {
            return Termination::Exited(code);
        }
        status
            .signal()
            .and_then(|raw| Signal::try_from(raw).ok())
            .map_or(Termination::Unknown, Termination::Signaled)
    }
}
