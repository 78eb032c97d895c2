//! In-memory TTL cache
//!
//! Process-scoped expiring map used as the first tier of the price pipeline
//! and by the token service. Expired entries are treated as misses and
//! dropped on the next `cleanup`.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Cache entry with TTL tracking
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Check if entry is still valid
    pub fn is_valid(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(default_ttl, Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.insert_with_ttl(key, value, ttl);
    }

    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.cleanup();
            if self.entries.len() >= self.max_entries {
                self.remove_oldest();
            }
        }
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// Get a cached value if still valid
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_valid())
            .map(|entry| entry.value.clone())
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid());
        before - self.entries.len()
    }

    fn remove_oldest(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&oldest_key);
        }
    }

    /// Number of entries, including expired ones not yet cleaned up
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_value_served_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(120));
        cache.insert("fuel".to_string(), 0.05);

        tokio::time::advance(Duration::from_secs(119)).await;
        assert_eq!(cache.get(&"fuel".to_string()), Some(0.05));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&"fuel".to_string()), None);
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_oldest_when_full() {
        let mut cache = TtlCache::with_capacity(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.insert("b", 2);
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }
}
