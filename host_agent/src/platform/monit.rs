//! The process-monitoring daemon: starting it and managing its local credentials.

use eyre::{Result, WrapErr as _, eyre};
use secrecy::SecretString;
use tokio::fs;
use tracing::info;
use vmagent_runner::CmdRunner;

use super::{Platform, secrets::generate_password, write_file};

const MONIT_USER_FILE: &str = "monit/monit.user";
const MONIT_USER: &str = "vcap";

/// Login for the monit HTTP interface, as stored in `monit.user`.
#[derive(Debug)]
pub struct MonitCredentials {
    pub username: String,
    pub password: SecretString,
}

impl<R: CmdRunner> Platform<R> {
    /// Brings the monit service up through runit.
    ///
    /// # Errors
    ///
    /// Returns an error if `sv` fails.
    #[tracing::instrument(skip(self))]
    pub async fn start_monit(&self) -> Result<()> {
        self.run("Shelling out to sv", "sv", &["up", "monit"])
            .await?;
        Ok(())
    }

    /// Creates the monit credentials file with a fresh random password, unless it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[tracing::instrument(skip(self))]
    pub async fn setup_monit_user(&self) -> Result<()> {
        let path = self.base_path(MONIT_USER_FILE);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        write_file(&path, &format!("{MONIT_USER}:{}", generate_password()))
            .await
            .wrap_err("Writing monit user file")?;
        info!(path = %path.display(), "Created monit user");
        Ok(())
    }

    /// Reads the monit credentials written by [`Platform::setup_monit_user`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no `:` separator.
    pub async fn monit_credentials(&self) -> Result<MonitCredentials> {
        let content = fs::read_to_string(self.base_path(MONIT_USER_FILE))
            .await
            .wrap_err("Reading monit user file")?;
        let (username, password) = content.split_once(':').ok_or_else(|| {
            eyre!(
                "Malformed monit user file, expecting username and password separated by ':'"
            )
        })?;
        Ok(MonitCredentials {
            username: username.to_owned(),
            password: SecretString::from(password),
        })
    }
}
