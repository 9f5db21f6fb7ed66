//! Handlers for the subcommands.

use core::time::Duration;
use std::{path::PathBuf, process::ExitCode};

use eyre::{Result, WrapErr as _};
use tokio::time::sleep;
use tracing::{info, warn};
use vmagent_runner::{CmdRunner, Command, ExecCmdRunner, ExecResult, LaunchError};

use crate::{
    cli::{PlatformCommand, RunArgs},
    config::AgentConfig,
    platform::Platform,
};

/// Exit code reported when the command has no exit status of its own.
const NO_STATUS_EXIT_CODE: u8 = 255;

/// Maps an [`ExecResult::exit_status`] onto a process exit code, `-1` becoming 255.
#[must_use]
pub fn exit_code(exit_status: i32) -> u8 {
    u8::try_from(exit_status).unwrap_or(NO_STATUS_EXIT_CODE)
}

fn runner(config: &AgentConfig) -> Result<ExecCmdRunner> {
    let signals = config
        .termination
        .signals()
        .wrap_err("Reading termination signals")?;
    Ok(ExecCmdRunner::default().with_signals(signals))
}

/// Runs the command described by `args`, relays its output and returns its exit status.
///
/// # Errors
///
/// Returns an error if the command could not be terminated or its result was lost.
pub async fn run(args: RunArgs, config: &AgentConfig) -> Result<ExitCode> {
    let runner = runner(config)?;
    let cmd = build_command(args.command, args.env, args.cwd, args.stdin);

    let result = match args.terminate_after {
        None => runner.run_complex_command(&cmd).await,
        Some(after) => {
            let grace = args
                .grace
                .map_or_else(|| config.termination.timeout(), Duration::from_secs);
            run_with_deadline(&runner, &cmd, Duration::from_secs(after), grace).await?
        }
    };

    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if let Some(ref error) = result.error {
        warn!("{error}");
    }
    Ok(ExitCode::from(exit_code(result.exit_status)))
}

fn build_command(
    command: Vec<String>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    stdin: Option<String>,
) -> Command {
    let mut words = command.into_iter();
    let mut cmd = Command::new(words.next().unwrap_or_default())
        .args(words)
        .envs(env);
    if let Some(cwd) = cwd {
        cmd = cmd.working_dir(cwd);
    }
    if let Some(stdin) = stdin {
        cmd = cmd.stdin(stdin);
    }
    cmd
}

/// Starts `cmd` in the background and terminates it nicely if it is still running after `after`.
async fn run_with_deadline(
    runner: &ExecCmdRunner,
    cmd: &Command,
    after: Duration,
    grace: Duration,
) -> Result<ExecResult> {
    let mut process = runner
        .run_complex_command_async(cmd)
        .unwrap_or_else(LaunchError::into_process);
    let mut waiter = process.wait();

    let received = tokio::select! {
        received = &mut waiter => received,
        () = sleep(after) => {
            info!(command = %cmd, ?after, ?grace, "Deadline reached, terminating");
            process
                .terminate_nicely(grace)
                .await
                .wrap_err("Terminating command")?;
            waiter.await
        }
    };
    received.wrap_err("The command's result was never delivered")
}

/// Reports whether `name` resolves to an executable.
#[must_use]
pub fn command_exists(name: &str) -> ExitCode {
    if ExecCmdRunner::default().command_exists(name) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Performs one platform operation and prints what it reports.
///
/// # Errors
///
/// Returns whatever error the operation reports.
pub async fn platform(op: PlatformCommand, config: &AgentConfig) -> Result<ExitCode> {
    let platform = Platform::new(runner(config)?, config);
    match op {
        PlatformCommand::CreateUser {
            username,
            password,
            base_path,
        } => {
            platform
                .create_user(&username, password.as_deref(), &base_path)
                .await?;
        }
        PlatformCommand::AddUserToGroups { username, groups } => {
            platform.add_user_to_groups(&username, &groups).await?;
        }
        PlatformCommand::DeleteEphemeralUsers { regex } => {
            for user in platform.delete_ephemeral_users_matching(&regex).await? {
                println!("{user}");
            }
        }
        PlatformCommand::SetUserPassword {
            username,
            encrypted_password,
        } => {
            platform
                .set_user_password(&username, &encrypted_password)
                .await?;
        }
        PlatformCommand::SetupSsh {
            username,
            public_key,
        } => platform.setup_ssh(&public_key, &username).await?,
        PlatformCommand::SetupHostname { hostname } => platform.setup_hostname(&hostname).await?,
        PlatformCommand::SetTime { servers } => platform.set_time_with_ntp_servers(&servers).await?,
        PlatformCommand::NtpInfo => println!("{}", platform.ntp_info().await?),
        PlatformCommand::SetupTmpDir => platform.setup_tmp_dir().await?,
        PlatformCommand::SetupLogrotate {
            group,
            base_path,
            size,
        } => platform.setup_logrotate(&group, &base_path, &size).await?,
        PlatformCommand::StartMonit => platform.start_monit().await?,
        PlatformCommand::SetupMonitUser => platform.setup_monit_user().await?,
        PlatformCommand::MonitCredentials => {
            println!("{}", platform.monit_credentials().await?.username);
        }
        PlatformCommand::RealDevicePath { device } => {
            println!("{}", platform.real_device_path(&device).await?.display());
        }
        PlatformCommand::NormalizeDiskPath { device } => {
            let Some(path) = platform.normalize_disk_path(&device).await else {
                return Ok(ExitCode::FAILURE);
            };
            println!("{}", path.display());
        }
        PlatformCommand::MigratePersistentDisk { from, to } => {
            platform.migrate_persistent_disk(&from, &to).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
