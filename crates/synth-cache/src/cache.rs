use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use synth_core::Result;

/// A single cached value plus the bookkeeping needed for TTL eviction and
/// hit-rate accounting.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: SystemTime,
    pub access_count: u64,
    pub ttl: Option<Duration>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Option<Duration>) -> Self {
        Self { value, created_at: SystemTime::now(), access_count: 0, ttl }
    }

    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.created_at.elapsed().unwrap_or(Duration::ZERO) > ttl,
            None => false,
        }
    }

    pub fn touch(&mut self) {
        self.access_count += 1;
    }
}

/// Generic async cache contract, shared by the Retrieval Service's internal
/// and external query caches (§4.B Caching).
#[async_trait]
pub trait AiCache<K, V>: Send + Sync {
    async fn insert(&self, key: K, value: V, ttl: Option<Duration>) -> Result<()>;
    async fn get(&self, key: &K) -> Result<Option<V>>;
    async fn remove(&self, key: &K) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    async fn stats(&self) -> Result<CacheStats>;
    async fn len(&self) -> Result<usize>;
}

/// Cache performance statistics (§4.B observability).
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
