//! SQLite-backed link cache implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{CacheEntry, CacheStore, StoreError};

/// SQLite-backed link cache.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Create a new SQLite cache, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite cache (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            -- Resolved links (one row per item id, last writer wins)
            CREATE TABLE IF NOT EXISTS link_cache (
                item_id TEXT PRIMARY KEY,
                link TEXT NOT NULL,
                resolved_at TEXT NOT NULL,
                expires_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_link_cache_expires ON link_cache(expires_at);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Fetch the full entry for an item id, including expired rows.
    pub fn entry(&self, item_id: &str) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT item_id, link, resolved_at, expires_at FROM link_cache WHERE item_id = ?",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut rows = stmt
            .query_map(params![item_id], |row| {
                let resolved_at_str: String = row.get(2)?;
                let expires_at_str: Option<String> = row.get(3)?;
                Ok(CacheEntry {
                    item_id: row.get(0)?,
                    link: row.get(1)?,
                    resolved_at: parse_timestamp(&resolved_at_str),
                    expires_at: expires_at_str.as_deref().map(parse_timestamp),
                })
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| StoreError::Database(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM link_cache WHERE expires_at IS NULL OR expires_at > ?",
            params![Utc::now().to_rfc3339()],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, item_id: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let link: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT link, expires_at FROM link_cache WHERE item_id = ?",
                params![item_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Database(other.to_string())),
            })?;

        match link {
            Some((link, expires_at)) => {
                let expired = expires_at
                    .as_deref()
                    .map(|exp| parse_timestamp(exp) <= Utc::now())
                    .unwrap_or(false);
                if expired {
                    // Lazy cleanup: expired rows read as misses and are dropped.
                    conn.execute("DELETE FROM link_cache WHERE item_id = ?", params![item_id])
                        .map_err(|e| StoreError::Database(e.to_string()))?;
                    Ok(None)
                } else {
                    Ok(Some(link))
                }
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        item_id: &str,
        link: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .map(|d| (now + d).to_rfc3339())
        });

        conn.execute(
            "INSERT INTO link_cache (item_id, link, resolved_at, expires_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(item_id) DO UPDATE SET
                 link = excluded.link,
                 resolved_at = excluded.resolved_at,
                 expires_at = excluded.expires_at",
            params![item_id, link, now.to_rfc3339(), expires_at],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = SqliteCacheStore::in_memory().unwrap();
        assert_eq!(store.get("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SqliteCacheStore::in_memory().unwrap();
        store
            .set("12345", "https://mega.nz/file/abc", None)
            .await
            .unwrap();
        assert_eq!(
            store.get("12345").await.unwrap(),
            Some("https://mega.nz/file/abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_link() {
        let store = SqliteCacheStore::in_memory().unwrap();
        store.set("id", "https://old.example", None).await.unwrap();
        store.set("id", "https://new.example", None).await.unwrap();
        assert_eq!(
            store.get("id").await.unwrap(),
            Some("https://new.example".to_string())
        );
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_exact_match() {
        let store = SqliteCacheStore::in_memory().unwrap();
        store.set("Item-1", "https://a.example", None).await.unwrap();
        assert_eq!(store.get("item-1").await.unwrap(), None);
        assert_eq!(store.get("Item-1 ").await.unwrap(), None);
        assert!(store.get("Item-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let store = SqliteCacheStore::in_memory().unwrap();
        store
            .set("soon", "https://gone.example", Some(Duration::from_secs(0)))
            .await
            .unwrap();
        assert_eq!(store.get("soon").await.unwrap(), None);
        // Lazy cleanup removed the row entirely.
        assert!(store.entry("soon").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_metadata() {
        let store = SqliteCacheStore::in_memory().unwrap();
        store
            .set("id", "https://a.example", Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        let entry = store.entry("id").unwrap().unwrap();
        assert_eq!(entry.item_id, "id");
        assert_eq!(entry.link, "https://a.example");
        let expires_at = entry.expires_at.unwrap();
        assert!(expires_at > entry.resolved_at);
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let store = SqliteCacheStore::new(&path).unwrap();
            store.set("id", "https://a.example", None).await.unwrap();
        }
        let store = SqliteCacheStore::new(&path).unwrap();
        assert_eq!(
            store.get("id").await.unwrap(),
            Some("https://a.example".to_string())
        );
    }
}
