//! Durable item-id → link cache.
//!
//! The cache is shared state across server instances; the adapter performs no
//! client-side locking beyond what its own connection requires. Single-key
//! read/write atomicity is all the orchestrator depends on.

mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub use sqlite::SqliteCacheStore;

/// Errors from the cache store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Cache database error: {0}")]
    Database(String),
}

/// A resolved link held by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub item_id: String,
    pub link: String,
    pub resolved_at: DateTime<Utc>,
    /// When the entry stops being served. `None` means no expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Key-value store for resolved links.
///
/// Implementations must be safe for concurrent use from many request tasks
/// and from multiple processes sharing the same backing store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up the link for an item id. Expired entries read as misses.
    async fn get(&self, item_id: &str) -> Result<Option<String>, StoreError>;

    /// Store a resolved link, replacing any previous entry for the id.
    async fn set(
        &self,
        item_id: &str,
        link: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;
}
