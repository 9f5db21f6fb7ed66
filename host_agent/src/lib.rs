//! Library entry for the `vmagent` binary.
//!
//! Exposes `inner_main` so the workspace-level shim binary can call into the agent logic:
//! running single commands through the process-group runner and configuring the machine.

extern crate alloc;
extern crate core;

pub mod cli;
pub mod commands;
pub mod config;
pub mod platform;

use std::{env, io, process::ExitCode, sync::Once};

use eyre::{Result, WrapErr as _};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();

/// Set in integration tests to keep the agent's own logging quiet.
pub const INTEGRATION_TEST_ENV: &str = "VMAGENT_INTEGRATION_TEST";

/// The agent's main function; can be called from a shim binary.
///
/// Sets up logging, loads the configuration and dispatches the subcommand.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the subcommand fails.
pub async fn inner_main(invocation: Cli) -> Result<ExitCode> {
    init_tracing(invocation.log_format);

    let config = config::load(&invocation.config).await.wrap_err(format!(
        "Loading config from {}",
        invocation.config.display()
    ))?;
    debug!(?config, "Loaded configuration");

    match invocation.command {
        Command::Run(args) => commands::run(args, &config).await,
        Command::CommandExists { name } => Ok(commands::command_exists(&name)),
        Command::Platform(op) => commands::platform(op, &config).await,
    }
}

/// Installs the global subscriber. Logs go to stderr so command output on stdout stays clean.
fn init_tracing(log_format: LogFormat) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var(INTEGRATION_TEST_ENV).is_ok() {
            "error"
        } else {
            "info"
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339())
            .with_writer(io::stderr);

        match log_format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}
