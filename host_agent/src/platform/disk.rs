use core::time::Duration;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use tokio::fs;
use tracing::{debug, info};
use vmagent_runner::{CmdRunner, wait::poll_until};

use super::Platform;

const DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Device prefixes a `/dev/sdX` disk may show up under, depending on the hypervisor.
const DEVICE_PREFIXES: [&str; 3] = ["/dev/xvd", "/dev/vd", "/dev/sd"];

impl<R: CmdRunner> Platform<R> {
    /// Finds the device node that actually backs the disk the control plane calls `device`.
    ///
    /// `device` must be of the form `/dev/sdX`. The disk may not be attached yet, so this polls
    /// until one of the candidate nodes exists or the configured disk timeout passes.
    ///
    /// # Errors
    ///
    /// Returns an error if `device` is not a `/dev/sd` path or no node appeared in time.
    #[tracing::instrument(skip(self))]
    pub async fn real_device_path(&self, device: &str) -> Result<PathBuf> {
        let suffix = device
            .strip_prefix("/dev/sd")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| eyre!("Not a /dev/sd device path: {device}"))?;

        let found = poll_until(self.disk_wait_timeout, DEVICE_POLL_INTERVAL, move || async move {
            self.find_possible_device(suffix).await
        })
        .await
        .map_err(|e| eyre!("Timed out getting real device path for {device}: {e}"))?;
        debug!(real_path = %found.display(), "Resolved device");
        Ok(found)
    }

    /// Like [`Platform::real_device_path`], but `None` when the device cannot be resolved.
    pub async fn normalize_disk_path(&self, device: &str) -> Option<PathBuf> {
        self.real_device_path(device).await.ok()
    }

    /// Moves the contents of the persistent disk mounted at `from` onto the one mounted at
    /// `to`, then mounts the new disk in place of the old one.
    ///
    /// The old disk is remounted read-only first; the copy keeps ownership, modes and
    /// timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error naming the step that failed.
    #[tracing::instrument(skip(self))]
    pub async fn migrate_persistent_disk(&self, from: &Path, to: &Path) -> Result<()> {
        let from_str = from.to_string_lossy();
        let to_str = to.to_string_lossy();

        self.run(
            "Remounting persistent disk as readonly",
            "mount",
            &["-o", "remount,ro", &*from_str],
        )
        .await?;

        let tar_copy = format!(
            "(tar -C {} -cf - .) | (tar -C {} -xpf -)",
            shell_quote(&from_str),
            shell_quote(&to_str)
        );
        self.run(
            "Copying files from old disk to new disk",
            "sh",
            &["-c", tar_copy.as_str()],
        )
        .await?;

        self.run("Unmounting old persistent disk", "umount", &[&*from_str])
            .await?;
        self.run(
            "Remounting new disk on original mountpoint",
            "mount",
            &["--move", &*to_str, &*from_str],
        )
        .await?;
        info!("Migrated persistent disk");
        Ok(())
    }

    async fn find_possible_device(&self, suffix: &str) -> Option<PathBuf> {
        for prefix in DEVICE_PREFIXES {
            let candidate = PathBuf::from(format!("{prefix}{suffix}"));
            if fs::try_exists(self.resolve(&candidate)).await.unwrap_or(false) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Single-quotes `word` for `sh`.
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
