//! Key-value storage of models, pending deltas and counters.
mod fs;
mod memory;
use crate::StoreConfig;
use async_trait::async_trait;
pub use fs::FsStore;
pub use memory::MemoryStore;
use std::sync::Arc;
use thiserror::Error;

/// Errors of [`BlobStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure of the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key cannot be mapped to the backend.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// A flat store of text values addressed by `/`-separated keys.
///
/// A single `set` replaces the value atomically; there is no transaction over
/// several keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the value of `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes the value of `key`.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Returns at most `limit` keys starting with `prefix`, in lexical order.
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Creates the store selected by the configuration.
pub fn build(config: &StoreConfig) -> Result<Arc<dyn BlobStore>, StoreError> {
    Ok(match config {
        StoreConfig::Memory => Arc::new(MemoryStore::default()),
        StoreConfig::Fs { root } => Arc::new(FsStore::new(root)?),
    })
}
