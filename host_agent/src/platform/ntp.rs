//! Clock synchronisation with `ntpdate` and reporting of its last outcome.

use core::fmt;
use std::io;

use eyre::{Result, WrapErr as _};
use regex::Regex;
use tokio::fs;
use tracing::debug;
use vmagent_runner::CmdRunner;

use super::{Platform, write_file};

const NTP_SERVER_FILE: &str = "agent/etc/ntpserver";
const NTPDATE_OUTPUT_FILE: &str = "agent/log/ntpdate.out";

/// What the last `ntpdate` run reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtpInfo {
    Synced { timestamp: String, offset: String },
    BadServer,
    BadFileContents,
    FileMissing,
}

impl NtpInfo {
    /// The diagnostic for anything but a successful sync.
    #[must_use]
    pub const fn message(&self) -> Option<&'static str> {
        match *self {
            Self::Synced { .. } => None,
            Self::BadServer => Some("bad ntp server"),
            Self::BadFileContents => Some("bad file contents"),
            Self::FileMissing => Some("file missing"),
        }
    }

    fn parse(output: &str) -> Result<Self> {
        let adjusted = Regex::new(
            r"^(?P<timestamp>.+?)\s+ntpdate\[\d+\]:\s+adjust time server \S+ offset (?P<offset>-?\d+\.\d+) sec",
        )
        .wrap_err("Compiling ntpdate pattern")?;

        let Some(last) = output.lines().rev().find(|line| !line.trim().is_empty()) else {
            return Ok(Self::BadFileContents);
        };
        if last.contains("no server suitable for synchronization found") {
            return Ok(Self::BadServer);
        }
        Ok(adjusted
            .captures(last)
            .map_or(Self::BadFileContents, |caps| Self::Synced {
                timestamp: caps["timestamp"].to_owned(),
                offset: caps["offset"].to_owned(),
            }))
    }
}

impl fmt::Display for NtpInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Synced {
                ref timestamp,
                ref offset,
            } => write!(f, "{timestamp}: offset {offset} sec"),
            _ => f.write_str(self.message().unwrap_or_default()),
        }
    }
}

impl<R: CmdRunner> Platform<R> {
    /// Records `servers` for the periodic sync job and makes one best-effort sync right away.
    ///
    /// Does nothing when `servers` is empty. The outcome of the immediate `ntpdate` run is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the server file cannot be written.
    #[tracing::instrument(skip(self))]
    pub async fn set_time_with_ntp_servers(&self, servers: &[String]) -> Result<()> {
        if servers.is_empty() {
            return Ok(());
        }
        let path = self.base_path(NTP_SERVER_FILE);
        write_file(&path, &servers.join(" "))
            .await
            .wrap_err_with(|| format!("Writing to {}", path.display()))?;

        let result = self.runner.run_command("ntpdate", &[]).await;
        debug!(exit_status = result.exit_status, "Ran ntpdate");
        Ok(())
    }

    /// Reads the output of the last `ntpdate` run.
    ///
    /// # Errors
    ///
    /// Returns an error if the output file exists but cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn ntp_info(&self) -> Result<NtpInfo> {
        match fs::read_to_string(self.base_path(NTPDATE_OUTPUT_FILE)).await {
            Ok(output) => NtpInfo::parse(&output),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(NtpInfo::FileMissing),
            Err(e) => Err(e).wrap_err("Reading ntpdate output"),
        }
    }
}
