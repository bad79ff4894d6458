//! The external tunnel subsystem boundary.
//!
//! The agent only generates configuration and asks the tunnel subsystem to
//! apply it; key exchange, encryption and packet forwarding live entirely
//! behind this interface. Reconfiguration is a full replace: the interface is
//! taken down and brought back up with the new document.

mod config;
mod wg_quick;

pub use config::*;
use std::path::Path;
use thiserror::Error;
pub use wg_quick::*;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Brings a tunnel interface up or down from a configuration file. Both
/// operations must tolerate the down→up replace pattern.
#[async_trait::async_trait]
pub trait Tunnel: Send + Sync {
    async fn up(&self, config_path: &Path) -> Result<(), Error>;
    async fn down(&self, config_path: &Path) -> Result<(), Error>;
}
