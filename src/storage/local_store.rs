//! Persistent expiring key/value store
//!
//! Bottom cache tier, backed by a sled tree. Entries carry their own
//! expiry so they survive restarts with the correct remaining lifetime.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{TrackerError, TrackerResult};

const TREE_NAME: &str = "cache";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if now >= exp)
    }
}

#[derive(Clone)]
pub struct LocalStore {
    tree: sled::Tree,
}

impl LocalStore {
    /// Open (or create) the store under `dir`.
    pub fn open(dir: &Path) -> TrackerResult<Self> {
        let db = sled::open(dir.join("local_cache"))?;
        Self::from_db(&db)
    }

    /// In-memory store that is discarded on drop.
    pub fn temporary() -> TrackerResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    fn from_db(db: &sled::Db) -> TrackerResult<Self> {
        Ok(Self {
            tree: db.open_tree(TREE_NAME)?,
        })
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> TrackerResult<()> {
        let now = Utc::now();
        let expires_at = match ttl {
            Some(ttl) => Some(
                now + ChronoDuration::from_std(ttl)
                    .map_err(|e| TrackerError::StorageError(format!("invalid ttl: {}", e)))?,
            ),
            None => None,
        };
        let entry = StoredEntry {
            value: serde_json::to_value(value)?,
            stored_at: now,
            expires_at,
        };
        self.tree.insert(key.as_bytes(), serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    /// Value for `key` if present and unexpired. Expired entries are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> TrackerResult<Option<T>> {
        let Some(entry) = self.read_entry(key)? else {
            return Ok(None);
        };
        if entry.is_expired(Utc::now()) {
            debug!("Local cache entry {} expired", key);
            self.tree.remove(key.as_bytes())?;
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(entry.value)?))
    }

    /// Value for `key` regardless of expiry, with the time it was stored.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> TrackerResult<Option<(T, DateTime<Utc>)>> {
        match self.read_entry(key)? {
            Some(entry) => Ok(Some((serde_json::from_value(entry.value)?, entry.stored_at))),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> TrackerResult<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    /// Delete every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> TrackerResult<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for item in self.tree.iter() {
            let (key, raw) = item?;
            let expired = match serde_json::from_slice::<StoredEntry>(&raw) {
                Ok(entry) => entry.is_expired(now),
                // Unreadable rows are dropped too
                Err(_) => true,
            };
            if expired {
                self.tree.remove(key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn clear(&self) -> TrackerResult<()> {
        self.tree.clear()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn read_entry(&self, key: &str) -> TrackerResult<Option<StoredEntry>> {
        let Some(raw) = self.tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        match serde_json::from_slice(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Discarding corrupt local cache entry {}: {}", key, e);
                self.tree.remove(key.as_bytes())?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_within_ttl() {
        let store = LocalStore::temporary().unwrap();
        store.set("price:fuel", &0.05_f64, Some(Duration::from_secs(120))).unwrap();
        let value: Option<f64> = store.get("price:fuel").unwrap();
        assert_eq!(value, Some(0.05));
    }

    #[test]
    fn test_expired_entry_is_a_miss_but_stale_read_survives() {
        let store = LocalStore::temporary().unwrap();
        store.set("ath:fuel", &"old".to_string(), Some(Duration::ZERO)).unwrap();

        let (stale, _) = store.get_stale::<String>("ath:fuel").unwrap().unwrap();
        assert_eq!(stale, "old");

        let fresh: Option<String> = store.get("ath:fuel").unwrap();
        assert!(fresh.is_none());
        // Read-time expiry removes the row
        assert!(store.get_stale::<String>("ath:fuel").unwrap().is_none());
    }

    #[test]
    fn test_purge_expired_keeps_live_entries() {
        let store = LocalStore::temporary().unwrap();
        store.set("a", &1_u32, Some(Duration::ZERO)).unwrap();
        store.set("b", &2_u32, Some(Duration::from_secs(60))).unwrap();
        store.set("c", &3_u32, None).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get::<u32>("c").unwrap(), Some(3));

        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
