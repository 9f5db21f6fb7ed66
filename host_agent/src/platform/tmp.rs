use eyre::Result;
use vmagent_runner::CmdRunner;

use super::Platform;

impl<R: CmdRunner> Platform<R> {
    /// Restricts `/tmp` to root and the `vcap` group.
    ///
    /// # Errors
    ///
    /// Returns an error if `chown` or `chmod` fails.
    #[tracing::instrument(skip(self))]
    pub async fn setup_tmp_dir(&self) -> Result<()> {
        self.run("chown /tmp", "chown", &["root:vcap", "/tmp"])
            .await?;
        self.run("chmod /tmp", "chmod", &["0770", "/tmp"]).await?;
        Ok(())
    }
}
