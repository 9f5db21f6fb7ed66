use eyre::{Result, WrapErr as _};
use vmagent_runner::CmdRunner;

use super::{Platform, write_file};

fn etc_hosts(hostname: &str) -> String {
    format!(
        "127.0.0.1 localhost {hostname}

# The following lines are desirable for IPv6 capable hosts
::1 localhost ip6-localhost ip6-loopback {hostname}
fe00::0 ip6-localnet
ff00::0 ip6-mcastprefix
ff02::1 ip6-allnodes
ff02::2 ip6-allrouters
ff02::3 ip6-allhosts
"
    )
}

impl<R: CmdRunner> Platform<R> {
    /// Sets the running hostname and persists it in `/etc/hostname` and `/etc/hosts`.
    ///
    /// # Errors
    ///
    /// Returns an error if `hostname` fails or either file cannot be written.
    #[tracing::instrument(skip(self))]
    pub async fn setup_hostname(&self, hostname: &str) -> Result<()> {
        self.run("Shelling out to hostname", "hostname", &[hostname])
            .await?;
        write_file(&self.resolve("/etc/hostname"), hostname)
            .await
            .wrap_err("Writing /etc/hostname")?;
        write_file(&self.resolve("/etc/hosts"), &etc_hosts(hostname))
            .await
            .wrap_err("Writing to /etc/hosts")
    }
}
