//! Mock cache store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::{CacheStore, StoreError};

/// In-memory mock of the `CacheStore` trait with error injection.
///
/// TTLs are recorded but never enforced; expiry behavior belongs to the real
/// store's tests.
pub struct MockCacheStore {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl Default for MockCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCacheStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }

    /// Make every `get` fail until cleared.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every `set` fail until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls so far.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Peek at a stored link without counting as a lookup.
    pub fn stored(&self, item_id: &str) -> Option<String> {
        self.entries.lock().unwrap().get(item_id).cloned()
    }

    /// Seed an entry directly.
    pub fn insert(&self, item_id: &str, link: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(item_id.to_string(), link.to_string());
    }
}

#[async_trait]
impl CacheStore for MockCacheStore {
    async fn get(&self, item_id: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected read failure".to_string()));
        }
        Ok(self.entries.lock().unwrap().get(item_id).cloned())
    }

    async fn set(
        &self,
        item_id: &str,
        link: &str,
        _ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(item_id.to_string(), link.to_string());
        Ok(())
    }
}
