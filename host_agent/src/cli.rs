//! Command-line interface definitions for the agent.

use std::{env, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "vmagent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the configuration file. A missing file means defaults.
    #[arg(short, long, global = true, default_value = "vmagent.toml")]
    pub config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
    Pretty,
}

/// Available subcommands for the agent.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one command in its own process group and exit with its status.
    Run(RunArgs),

    /// Exit successfully if NAME resolves to an executable on PATH.
    CommandExists { name: String },

    /// Configure this machine.
    #[command(subcommand)]
    Platform(PlatformCommand),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Start the command in the background and terminate it nicely after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub terminate_after: Option<u64>,

    /// Seconds between the polite and the forceful signal (defaults to the configured timeout).
    #[arg(long, value_name = "SECS", requires = "terminate_after")]
    pub grace: Option<u64>,

    /// Working directory for the command
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable, may be repeated
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Text fed to the command's standard input
    #[arg(long)]
    pub stdin: Option<String>,

    /// The command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

/// Operations on the local machine, each shelling out through the runner.
#[derive(Debug, Subcommand)]
pub enum PlatformCommand {
    /// Create a user with a home directory below BASE_PATH.
    CreateUser {
        username: String,
        /// Already encrypted password
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "/var/vcap/users")]
        base_path: PathBuf,
    },
    /// Replace the supplementary groups of a user.
    AddUserToGroups {
        username: String,
        #[arg(required = true)]
        groups: Vec<String>,
    },
    /// Delete ephemeral users whose name matches REGEX.
    DeleteEphemeralUsers { regex: String },
    SetUserPassword {
        username: String,
        encrypted_password: String,
    },
    /// Install PUBLIC_KEY as the user's only authorized SSH key.
    SetupSsh {
        username: String,
        public_key: String,
    },
    SetupHostname { hostname: String },
    /// Record the NTP servers and sync the clock once.
    SetTime { servers: Vec<String> },
    /// Show the result of the last clock sync.
    NtpInfo,
    SetupTmpDir,
    SetupLogrotate {
        group: String,
        base_path: PathBuf,
        /// Rotation threshold in logrotate syntax, e.g. 50M
        size: String,
    },
    StartMonit,
    SetupMonitUser,
    /// Print the monit user name; fails if the credentials file is malformed.
    MonitCredentials,
    /// Resolve a /dev/sdX name to the device node that actually exists.
    RealDevicePath { device: String },
    /// Like real-device-path, but prints nothing and fails quietly if the device is missing.
    NormalizeDiskPath { device: String },
    /// Copy the persistent disk at FROM onto the one at TO and mount TO in its place.
    MigratePersistentDisk { from: PathBuf, to: PathBuf },
}
