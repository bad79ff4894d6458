use crate::{directory, endpoint, identity, tunnel};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("identity error: {0}")]
    IdentityError(#[from] identity::Error),

    #[error("directory error: {0}")]
    DirectoryError(#[from] directory::Error),

    #[error("endpoint discovery error: {0}")]
    DiscoveryError(#[from] endpoint::Error),

    #[error("tunnel error: {0}")]
    TunnelError(#[from] tunnel::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}
