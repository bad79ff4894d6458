//! The shared key-value directory used as the sole coordination channel.
//!
//! The directory is eventually consistent and offers no transactions and no
//! change notifications; the only way to observe other participants is to
//! re-enumerate and re-read keys. All operations are scoped to a
//! (namespace, team) pair.

mod keybase;
mod memory;

pub use keybase::*;
pub use memory::*;
use thiserror::Error;

/// Namespace under which all teamnet entries live in the directory.
pub const NAMESPACE: &str = "teamnet";

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("directory API error: {0}")]
    ApiError(String),
}

/// Team-scoped key-value store.
///
/// `put` and `delete` are idempotent; `list_keys` may lag writes from other
/// participants by an unbounded but practically short interval.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<(), Error>;
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn list_keys(&self) -> Result<Vec<String>, Error>;
    async fn delete(&self, key: &str) -> Result<(), Error>;
}
