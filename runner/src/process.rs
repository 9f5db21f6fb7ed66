//! A launched process group: output capture, completion, and graceful termination.
//!
//! Each [`Process`] owns one OS process group. A background task reads stdout and
//! stderr as they are produced, reaps the group leader, and publishes exactly one
//! [`ExecResult`]. Termination drives the group through the polite and then the
//! forceful signal until no member is left, but never builds a result itself:
//! whatever the collector observes is what [`Process::wait`] delivers.

use alloc::sync::Arc;
use core::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use std::{io, process::ExitStatus, process::Stdio};

use nix::sys::signal::Signal;
use thiserror::Error as ThisError;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _, AsyncWriteExt as _},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command as OsCommand},
    sync::{oneshot, watch},
};
use tracing::{Instrument as _, debug, info, warn};

use crate::{
    command::Command,
    groups::{Delivery, EscalationSignals, ProcessGroups, Termination},
    path,
    result::{CmdError, ExecResult, NO_EXIT_STATUS},
    wait::poll_until,
};

/// How long to wait for the OS to reap the group after the forceful signal.
pub const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of a process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// The polite signal has been sent.
    Terminating,
    /// The leader has exited and its status was collected. Other members of the group
    /// may still be running.
    Exited,
}

#[derive(Debug)]
struct GroupControl {
    pgid: u32,
    groups: Arc<dyn ProcessGroups>,
    signals: EscalationSignals,
    /// Set before the forceful signal goes out; read by the collector.
    escalated: Arc<AtomicBool>,
}

/// Handle to one in-flight invocation.
#[derive(Debug)]
pub struct Process {
    group: Option<GroupControl>,
    state: Arc<watch::Sender<ProcessState>>,
    result_rx: Option<oneshot::Receiver<ExecResult>>,
}

/// The command could not be started, so there is no process group.
#[derive(Debug, ThisError)]
#[error(transparent)]
pub struct LaunchError(#[from] CmdError);

impl LaunchError {
    #[must_use]
    pub const fn error(&self) -> &CmdError {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> CmdError {
        self.0
    }

    /// A handle that is already [`ProcessState::Exited`] and whose [`Process::wait`]
    /// delivers the launch failure with an exit status of `-1`.
    #[must_use]
    pub fn into_process(self) -> Process {
        Process::finished(ExecResult::launch_failure(self.0))
    }
}

impl Process {
    /// Spawns `cmd` in a new process group and starts collecting its output.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn launch(
        cmd: &Command,
        groups: Arc<dyn ProcessGroups>,
        signals: EscalationSignals,
    ) -> Result<Self, LaunchError> {
        let command_line = cmd.to_string();
        if cmd.get_name().is_empty() {
            return Err(LaunchError(CmdError::EmptyName));
        }

        let mut os_cmd = OsCommand::new(cmd.get_name());
        os_cmd
            .args(cmd.get_args())
            .envs(cmd.get_env())
            .stdin(if cmd.get_stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cmd.get_working_dir() {
            os_cmd.current_dir(dir);
        }

        let mut child = match groups.spawn(&mut os_cmd) {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound && path::lookup_for(cmd).is_none() => {
                debug!(command = %command_line, "Executable not found");
                return Err(LaunchError(CmdError::NotFound {
                    command: command_line,
                }));
            }
            Err(source) => {
                return Err(LaunchError(CmdError::Spawn {
                    command: command_line,
                    source,
                }));
            }
        };

        let state = Arc::new(watch::channel(ProcessState::Running).0);
        let escalated = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = oneshot::channel();

        let pgid = child.id();
        debug!(command = %command_line, ?pgid, "Spawned process group");

        let pipes = Pipes {
            stdin: child.stdin.take().zip(cmd.get_stdin().map(str::to_owned)),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
        };
        let collector = Collector {
            command: command_line,
            state: Arc::clone(&state),
            groups: Arc::clone(&groups),
            escalated: Arc::clone(&escalated),
            forceful: signals.forceful,
            result_tx,
        };
        let span = tracing::debug_span!("process", ?pgid);
        tokio::spawn(collector.run(child, pipes).instrument(span));

        Ok(Self {
            group: pgid.map(|pgid| GroupControl {
                pgid,
                groups,
                signals,
                escalated,
            }),
            state,
            result_rx: Some(result_rx),
        })
    }

    /// A handle whose outcome is already known, without any OS process behind it.
    #[must_use]
    pub fn finished(result: ExecResult) -> Self {
        let (result_tx, result_rx) = oneshot::channel();
        if result_tx.send(result).is_err() {
            unreachable!("the receiver is alive in this scope");
        }
        Self {
            group: None,
            state: Arc::new(watch::channel(ProcessState::Exited).0),
            result_rx: Some(result_rx),
        }
    }

    /// Id of the process group, equal to the leader's pid. `None` for handles without a group.
    #[must_use]
    pub fn pgid(&self) -> Option<u32> {
        self.group.as_ref().map(|g| g.pgid)
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// The channel on which the single [`ExecResult`] of this process is delivered.
    ///
    /// # Panics
    ///
    /// Panics when called a second time; the result can only be consumed once.
    pub fn wait(&mut self) -> oneshot::Receiver<ExecResult> {
        self.result_rx
            .take()
            .expect("Process::wait called twice, the result can only be consumed once")
    }

    /// Asks the whole process group to stop, escalating to the forceful signal after `timeout`.
    ///
    /// Returns immediately if no member of the group is left. Otherwise the polite signal goes
    /// to the group and the call waits up to `timeout` for every member to be gone, not just the
    /// leader; if some remain, the forceful signal follows and the call waits up to
    /// [`KILL_REAP_TIMEOUT`] more.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal could not be delivered for a reason other than the group
    /// being gone, or if the group still existed after the forceful signal.
    pub async fn terminate_nicely(&self, timeout: Duration) -> Result<(), CmdError> {
        let Some(ref group) = self.group else {
            return Ok(());
        };

        self.state.send_if_modified(|state| {
            if *state == ProcessState::Running {
                *state = ProcessState::Terminating;
                true
            } else {
                false
            }
        });
        if !group.exists() {
            debug!(pgid = group.pgid, "Process group already exited");
            return Ok(());
        }

        info!(pgid = group.pgid, signal = %group.signals.polite, ?timeout, "Terminating process group");
        group.signal(group.signals.polite)?;
        if group.wait_gone(timeout).await {
            return Ok(());
        }

        warn!(
            pgid = group.pgid,
            signal = %group.signals.forceful,
            "Process group did not exit in time, killing it"
        );
        group.escalated.store(true, Ordering::SeqCst);
        group.signal(group.signals.forceful)?;
        if group.wait_gone(KILL_REAP_TIMEOUT).await {
            Ok(())
        } else {
            Err(CmdError::NotReaped {
                pgid: group.pgid,
                signal: group.signals.forceful.to_string(),
                waited_ms: KILL_REAP_TIMEOUT.as_millis(),
            })
        }
    }
}

impl GroupControl {
    fn exists(&self) -> bool {
        self.groups.group_exists(self.pgid)
    }

    /// Polls until no process is left in the group. `false` on timeout.
    async fn wait_gone(&self, timeout: Duration) -> bool {
        poll_until(timeout, GROUP_POLL_INTERVAL, || {
            let gone = !self.exists();
            async move { gone.then_some(()) }
        })
        .await
        .is_ok()
    }

    fn signal(&self, signal: Signal) -> Result<(), CmdError> {
        match self.groups.signal_group(self.pgid, signal) {
            Ok(Delivery::Sent) => Ok(()),
            Ok(Delivery::Gone) => {
                debug!(pgid = self.pgid, %signal, "Process group already gone");
                Ok(())
            }
            Err(source) => Err(CmdError::SignalGroup {
                pgid: self.pgid,
                signal: signal.to_string(),
                source,
            }),
        }
    }
}

struct Pipes {
    stdin: Option<(ChildStdin, String)>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

struct Collector {
    command: String,
    state: Arc<watch::Sender<ProcessState>>,
    groups: Arc<dyn ProcessGroups>,
    escalated: Arc<AtomicBool>,
    forceful: Signal,
    result_tx: oneshot::Sender<ExecResult>,
}

impl Collector {
    /// Captures both streams and reaps the leader concurrently, then publishes the result.
    async fn run(self, mut child: Child, pipes: Pipes) {
        let reap = async {
            let status = child.wait().await;
            self.state.send_replace(ProcessState::Exited);
            status
        };
        let ((), stdout, stderr, status) = tokio::join!(
            feed_stdin(pipes.stdin),
            read_stream(pipes.stdout),
            read_stream(pipes.stderr),
            reap,
        );

        let result = self.build_result(status, &stdout, &stderr);
        let exit_status = result.exit_status;
        debug!(command = %self.command, exit_status, "Process group finished");
        if self.result_tx.send(result).is_err() {
            debug!("Nobody is waiting for the result anymore");
        }
    }

    fn build_result(
        &self,
        status: io::Result<ExitStatus>,
        stdout: &[u8],
        stderr: &[u8],
    ) -> ExecResult {
        let stdout = String::from_utf8_lossy(stdout).into_owned();
        let stderr = String::from_utf8_lossy(stderr).into_owned();
        let command = self.command.clone();

        let termination = match status {
            // Once the forceful signal went out the group was killed, whatever the leader reported.
            Ok(_) if self.escalated.load(Ordering::SeqCst) => Termination::Signaled(self.forceful),
            Ok(status) => self.groups.decode_status(status),
            Err(source) => {
                return ExecResult {
                    stdout,
                    stderr,
                    exit_status: NO_EXIT_STATUS,
                    error: Some(CmdError::Collect { command, source }),
                };
            }
        };
        let exit_status = termination.exit_status();
        let error = match termination {
            Termination::Exited(0) => None,
            Termination::Exited(status) => Some(CmdError::NonZeroExit {
                command,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                status,
            }),
            Termination::Signaled(signal) => Some(CmdError::Signaled {
                command,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                signal: signal.to_string(),
            }),
            Termination::Unknown => Some(CmdError::NonZeroExit {
                command,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                status: NO_EXIT_STATUS,
            }),
        };
        ExecResult {
            stdout,
            stderr,
            exit_status,
            error,
        }
    }
}

/// Writes the configured input and closes the pipe. A child that exits without
/// reading its input is not an error.
async fn feed_stdin(stdin: Option<(ChildStdin, String)>) {
    let Some((mut pipe, input)) = stdin else {
        return;
    };
    if let Err(e) = pipe.write_all(input.as_bytes()).await {
        debug!("Could not write all of stdin: {e}");
    }
    drop(pipe);
}

/// Reads a stream to its end. Whatever was read before an error is kept.
async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream
        && let Err(e) = stream.read_to_end(&mut buf).await
    {
        warn!("Reading process output failed after {} bytes: {e}", buf.len());
    }
    buf
}
