use std::path::Path;

use eyre::{Result, WrapErr as _};
use vmagent_runner::CmdRunner;

use super::{Platform, write_file};

fn logrotate_config(base_path: &Path, size: &str) -> String {
    let logs = base_path.join("data/sys/log");
    let logs = logs.display();
    format!(
        "# Generated by vmagent

{logs}/*.log {logs}/*/*.log {logs}/*/*/*.log {{
  missingok
  rotate 7
  compress
  delaycompress
  copytruncate
  size={size}
}}
"
    )
}

impl<R: CmdRunner> Platform<R> {
    /// Writes `/etc/logrotate.d/<group>` rotating the job logs below `base_path` once they
    /// exceed `size`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[tracing::instrument(skip(self))]
    pub async fn setup_logrotate(&self, group: &str, base_path: &Path, size: &str) -> Result<()> {
        let path = self.resolve(Path::new("/etc/logrotate.d").join(group));
        write_file(&path, &logrotate_config(base_path, size))
            .await
            .wrap_err("Writing to /etc/logrotate.d")
    }
}
