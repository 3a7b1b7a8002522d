//! # Stream Cache
//!
//! Bounded map from `(source, id)` to a resolved URL and the instant it was
//! resolved. Entries are advisory: a hit can still fail at load time, in
//! which case the caller invalidates it and resolves again.
//!
//! The cache is the only state shared between the playback path and the
//! prefetch path. Writes are last-writer-wins.

use std::num::NonZeroUsize;
use std::time::Duration;

use core_async::time::{age_of, Instant};
use core_library::{SourceKind, TrackKey};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

/// One cached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStream {
    pub url: String,
    pub resolved_at: Instant,
}

/// Counters since construction (or the last [`StreamCache::clear`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub inserts: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

struct CacheInner {
    entries: LruCache<TrackKey, CachedStream>,
    stats: CacheStats,
}

pub struct StreamCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl StreamCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh URL for `(source, id)`. An expired entry is evicted and counts
    /// as a miss.
    pub fn get(&self, source: SourceKind, id: &str) -> Option<String> {
        let key = key(source, id);
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(&key) {
            Some(entry) if age_of(entry.resolved_at) < self.ttl => {
                let url = entry.url.clone();
                inner.stats.hits += 1;
                return Some(url);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(&key);
            inner.stats.expirations += 1;
            trace!(%key, "Cached stream expired");
        }
        inner.stats.misses += 1;
        None
    }

    /// Whether a fresh entry exists, without touching counters or recency.
    pub fn contains_fresh(&self, source: SourceKind, id: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .peek(&key(source, id))
            .is_some_and(|entry| age_of(entry.resolved_at) < self.ttl)
    }

    pub fn insert(&self, source: SourceKind, id: &str, url: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.entries.put(
            key(source, id),
            CachedStream {
                url: url.into(),
                resolved_at: Instant::now(),
            },
        );
        inner.stats.inserts += 1;
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, source: SourceKind, id: &str) -> bool {
        self.inner.lock().entries.pop(&key(source, id)).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let expired: Vec<TrackKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| age_of(entry.resolved_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.pop(key);
        }
        inner.stats.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }
}

fn key(source: SourceKind, id: &str) -> TrackKey {
    TrackKey {
        source,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_hit_then_expire() {
        let cache = StreamCache::new(8, TTL);
        cache.insert(SourceKind::VideoHost, "a", "https://cdn/a");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(SourceKind::VideoHost, "a").as_deref(), Some("https://cdn/a"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(SourceKind::VideoHost, "a"), None);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.inserts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_scoped_by_source() {
        let cache = StreamCache::new(8, TTL);
        cache.insert(SourceKind::AudioHost, "42", "https://audio/42");

        assert_eq!(cache.get(SourceKind::CatalogAggregator, "42"), None);
        assert!(cache.contains_fresh(SourceKind::AudioHost, "42"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recent() {
        let cache = StreamCache::new(2, TTL);
        cache.insert(SourceKind::VideoHost, "a", "1");
        cache.insert(SourceKind::VideoHost, "b", "2");
        cache.get(SourceKind::VideoHost, "a");
        cache.insert(SourceKind::VideoHost, "c", "3");

        assert!(cache.contains_fresh(SourceKind::VideoHost, "a"));
        assert!(!cache.contains_fresh(SourceKind::VideoHost, "b"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_invalidate() {
        let cache = StreamCache::new(8, TTL);
        cache.insert(SourceKind::VideoHost, "old", "1");
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert(SourceKind::VideoHost, "new", "2");
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(SourceKind::VideoHost, "new"));
        assert!(!cache.invalidate(SourceKind::VideoHost, "new"));

        cache.insert(SourceKind::VideoHost, "x", "3");
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
