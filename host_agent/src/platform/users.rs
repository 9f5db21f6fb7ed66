//! Local user accounts.

use std::path::Path;

use eyre::{Result, WrapErr as _};
use regex::Regex;
use tokio::fs;
use tracing::{info, warn};
use vmagent_runner::CmdRunner;

use super::Platform;

/// Users created for a limited time by the control plane carry this prefix; only they are
/// ever deleted in bulk.
pub const EPHEMERAL_USER_PREFIX: &str = "vmagent_";

impl<R: CmdRunner> Platform<R> {
    /// Creates `username` with a home directory below `base_path` and bash as its shell.
    ///
    /// `password` must already be encrypted; an empty or absent password leaves the account
    /// without one.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be created or `useradd` fails.
    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        username: &str,
        password: Option<&str>,
        base_path: &Path,
    ) -> Result<()> {
        let resolved = self.resolve(base_path);
        fs::create_dir_all(&resolved)
            .await
            .wrap_err("Making user base path")?;

        let base = base_path.to_string_lossy();
        let mut args = vec!["-m", "-b", &*base, "-s", "/bin/bash"];
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            args.extend(["-p", password]);
        }
        args.push(username);
        self.run("Shelling out to useradd", "useradd", &args).await?;
        info!("Created user");
        Ok(())
    }

    /// Sets the supplementary groups of `username` to exactly `groups`.
    ///
    /// # Errors
    ///
    /// Returns an error if `usermod` fails.
    #[tracing::instrument(skip(self))]
    pub async fn add_user_to_groups(&self, username: &str, groups: &[String]) -> Result<()> {
        let joined = groups.join(",");
        self.run(
            "Shelling out to usermod",
            "usermod",
            &["-G", joined.as_str(), username],
        )
        .await?;
        Ok(())
    }

    /// Deletes every ephemeral user whose name matches `pattern`, home directory included.
    ///
    /// A failure to delete one user is logged and does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex or the user database cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn delete_ephemeral_users_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let regex = Regex::new(pattern).wrap_err("Compiling regexp")?;
        let users = self
            .find_ephemeral_users_matching(&regex)
            .await
            .wrap_err("Finding ephemeral users")?;
        for user in &users {
            if let Err(e) = self
                .run("Shelling out to userdel", "userdel", &["-r", user.as_str()])
                .await
            {
                warn!(%user, "Deleting ephemeral user failed: {e:?}");
            }
        }
        Ok(users)
    }

    async fn find_ephemeral_users_matching(&self, regex: &Regex) -> Result<Vec<String>> {
        let passwd = fs::read_to_string(self.resolve("/etc/passwd"))
            .await
            .wrap_err("Reading /etc/passwd")?;
        Ok(passwd
            .lines()
            .filter_map(|line| line.split(':').next())
            .filter(|user| user.starts_with(EPHEMERAL_USER_PREFIX) && regex.is_match(user))
            .map(str::to_owned)
            .collect())
    }

    /// Replaces the password of `user` with an already encrypted one.
    ///
    /// # Errors
    ///
    /// Returns an error if `usermod` fails.
    #[tracing::instrument(skip(self, encrypted_password))]
    pub async fn set_user_password(&self, user: &str, encrypted_password: &str) -> Result<()> {
        self.run(
            "Shelling out to usermod",
            "usermod",
            &["-p", encrypted_password, user],
        )
        .await?;
        Ok(())
    }
}
