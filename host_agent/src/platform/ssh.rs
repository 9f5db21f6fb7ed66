use std::{fs::Permissions, os::unix::fs::PermissionsExt as _, path::PathBuf};

use eyre::{Result, WrapErr as _, eyre};
use tokio::fs;
use tracing::info;
use vmagent_runner::CmdRunner;

use super::{Platform, write_file};

const SSH_DIR_MODE: u32 = 0o700;
const AUTHORIZED_KEYS_MODE: u32 = 0o600;

impl<R: CmdRunner> Platform<R> {
    /// Installs `public_key` as the only authorized key of `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the user has no home directory or the key cannot be written.
    #[tracing::instrument(skip(self, public_key))]
    pub async fn setup_ssh(&self, public_key: &str, username: &str) -> Result<()> {
        let home = self
            .home_dir(username)
            .await
            .wrap_err("Finding home dir for user")?;
        let ssh_dir = home.join(".ssh");
        let resolved_dir = self.resolve(&ssh_dir);
        fs::create_dir_all(&resolved_dir)
            .await
            .wrap_err("Making .ssh directory")?;
        fs::set_permissions(&resolved_dir, Permissions::from_mode(SSH_DIR_MODE))
            .await
            .wrap_err("Setting permissions of .ssh directory")?;

        let keys = ssh_dir.join("authorized_keys");
        let resolved_keys = self.resolve(&keys);
        write_file(&resolved_keys, public_key)
            .await
            .wrap_err("Creating authorized_keys file")?;
        fs::set_permissions(&resolved_keys, Permissions::from_mode(AUTHORIZED_KEYS_MODE))
            .await
            .wrap_err("Setting permissions of authorized_keys file")?;

        // `user:` also sets the group to the user's login group.
        let owner = format!("{username}:");
        let ssh_dir = ssh_dir.to_string_lossy();
        let keys = keys.to_string_lossy();
        self.run(
            "Shelling out to chown",
            "chown",
            &[owner.as_str(), &*ssh_dir, &*keys],
        )
        .await?;
        info!("Installed authorized key");
        Ok(())
    }

    /// Home directory of `username` according to `/etc/passwd`.
    async fn home_dir(&self, username: &str) -> Result<PathBuf> {
        let passwd = fs::read_to_string(self.resolve("/etc/passwd"))
            .await
            .wrap_err("Reading /etc/passwd")?;
        passwd
            .lines()
            .map(|line| line.split(':').collect::<Vec<_>>())
            .find(|fields| fields.first() == Some(&username))
            .and_then(|fields| fields.get(5).filter(|home| !home.is_empty()).map(PathBuf::from))
            .ok_or_else(|| eyre!("No home directory for user {username}"))
    }
}
