//! Object store abstraction for the sluice pipeline.
//!
//! The pipeline only needs a narrow contract from its blob store: list a
//! prefix, probe a key (HEAD), get, put, copy-by-key, and delete. Two
//! implementations are provided: [`MemoryStore`] for tests and dry runs,
//! and [`S3Store`] over rust-s3 for production buckets.

use chrono::{DateTime, Utc};
use thiserror::Error;

mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Config, S3Store};

/// Metadata for one stored object, as returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Hierarchical key, unique within the store.
    pub key: String,
    /// Last-modified timestamp reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Payload length in bytes.
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("object store backend error: {0}")]
    Backend(String),
}

/// Blocking object store operations used by the pipeline.
///
/// Individual operations are atomic at the store, but nothing here is
/// coordinated with warehouse transactions; callers own that sequencing.
pub trait ObjectStore {
    /// List every object whose key starts with `prefix`, in key order.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Existence probe (HEAD). Never fetches the body.
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Fetch the full payload of `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite `key` with `body`.
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    /// Server-side copy of `src` to `dst` within the same store.
    fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}
