use crate::tunnel::{Error, Tunnel};
use crate::util;
use std::path::Path;
use tokio::process::Command;
use tracing::trace;

/// Tunnel backend driving `wg-quick`. The interface name is taken from the
/// configuration file name, so a down→up replace against the same path hits
/// the same interface.
pub struct WgQuick {
    bin: String,
}

impl WgQuick {
    pub fn new() -> Self {
        Self {
            bin: util::get_env("WG_QUICK_BIN", "wg-quick".to_string()),
        }
    }

    async fn run(&self, action: &str, config_path: &Path) -> Result<(), Error> {
        trace!("{} {} {}", self.bin, action, config_path.display());
        let output = Command::new(&self.bin)
            .arg(action)
            .arg(config_path)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: format!("{} {}", self.bin, action),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl Default for WgQuick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tunnel for WgQuick {
    async fn up(&self, config_path: &Path) -> Result<(), Error> {
        self.run("up", config_path).await
    }

    async fn down(&self, config_path: &Path) -> Result<(), Error> {
        self.run("down", config_path).await
    }
}
