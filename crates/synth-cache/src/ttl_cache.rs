use crate::cache::{AiCache, CacheEntry, CacheStats};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::time::Duration;
use synth_core::Result;
use tracing::debug;

/// Process-local TTL-keyed cache (§5 "the cache is process-local or shared
/// key-value; eviction is by TTL"). One instance backs the Retrieval
/// Service's internal-query cache and another backs the external
/// evidence-track cache (§4.B), each keyed by its own normalized string.
pub struct TtlCache<V: Clone + Send + Sync> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: DashMap::new(), default_ttl, stats: Mutex::new(CacheStats::default()) }
    }

    /// Normalizes a free-text query the way the Retrieval Service's cache key
    /// is built (§4.B: "Keyed by normalized query string"): trims, lowercases,
    /// and collapses internal whitespace so two queries that only differ in
    /// spacing or case share a cache entry.
    pub fn normalize_query(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }

    /// Builds the external evidence-track's composite key, (query, M, N)
    /// per §4.B.
    pub fn evidence_key(query: &str, max_results: usize, recency_years: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Self::normalize_query(query).as_bytes());
        hasher.update(max_results.to_le_bytes());
        hasher.update(recency_years.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Removes every expired entry; returns the count evicted. Callers may
    /// run this on a timer; it is also applied lazily on `get`.
    pub fn evict_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
        }
        if !expired.is_empty() {
            let mut stats = self.stats.lock();
            stats.evictions += expired.len() as u64;
            debug!(count = expired.len(), "evicted expired cache entries");
        }
        expired.len()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync> AiCache<String, V> for TtlCache<V> {
    async fn insert(&self, key: String, value: V, ttl: Option<Duration>) -> Result<()> {
        self.entries.insert(key, CacheEntry::new(value, Some(ttl.unwrap_or(self.default_ttl))));
        self.stats.lock().entries = self.entries.len();
        Ok(())
    }

    async fn get(&self, key: &String) -> Result<Option<V>> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                self.stats.lock().misses += 1;
                return Ok(None);
            }
            entry.touch();
            let value = entry.value.clone();
            drop(entry);
            self.stats.lock().hits += 1;
            Ok(Some(value))
        } else {
            self.stats.lock().misses += 1;
            Ok(None)
        }
    }

    async fn remove(&self, key: &String) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        *self.stats.lock() = CacheStats::default();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut stats = self.stats.lock().clone();
        stats.entries = self.entries.len();
        Ok(stats)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_is_bit_identical_to_original() {
        let cache: TtlCache<Vec<u8>> = TtlCache::new(Duration::from_secs(60));
        let key = TtlCache::<Vec<u8>>::normalize_query("  Glioblastoma   Management  ");
        cache.insert(key.clone(), vec![1, 2, 3], None).await.unwrap();
        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn normalization_merges_case_and_whitespace_variants() {
        let a = TtlCache::<()>::normalize_query("Glioblastoma Management");
        let b = TtlCache::<()>::normalize_query("  glioblastoma    management ");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_get() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(1));
        cache.insert("k".to_string(), 7, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get(&"k".to_string()).await.unwrap(), None);
        assert_eq!(cache.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn evidence_key_is_stable_for_same_triple() {
        let k1 = TtlCache::<()>::evidence_key("glioblastoma", 10, 5);
        let k2 = TtlCache::<()>::evidence_key("Glioblastoma", 10, 5);
        let k3 = TtlCache::<()>::evidence_key("glioblastoma", 20, 5);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
