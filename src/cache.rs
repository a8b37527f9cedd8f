//! In-memory response cache shared by the upstream clients.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Maximum number of entries. Zero disables caching.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Entry<V> {
    value: V,
    inserted: Instant,
}

struct Store<V> {
    entries: LruCache<String, Entry<V>>,
    hits: u64,
    misses: u64,
}

/// TTL cache keyed by canonical request strings (see [`cache_key`]).
///
/// A full cache first drops expired entries, then the least recently used one.
/// Cloning yields another handle to the same entries. The lock is never held across
/// an `.await`, so two concurrent misses for one key may both fetch; the later insert wins.
pub struct ResponseCache<V> {
    store: Arc<Mutex<Store<V>>>,
    config: CacheConfig,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        // capacity 0 never inserts, the one-slot map just stays empty
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(Mutex::new(Store {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            })),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store<V>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let ttl = self.config.ttl;
        let mut store = self.lock();
        let found = store
            .entries
            .get(key)
            .map(|e| (now.saturating_duration_since(e.inserted) < ttl, e.value.clone()));

        match found {
            Some((true, value)) => {
                store.hits += 1;
                Some(value)
            }
            Some((false, _)) => {
                store.entries.pop(key);
                store.misses += 1;
                None
            }
            None => {
                store.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: String, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&self, key: String, value: V, now: Instant) {
        if self.config.capacity == 0 {
            return;
        }
        let ttl = self.config.ttl;
        let mut store = self.lock();

        if !store.entries.contains(&key) && store.entries.len() >= self.config.capacity {
            let expired: Vec<String> = store
                .entries
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.inserted) >= ttl)
                .map(|(k, _)| k.clone())
                .collect();
            for k in expired {
                store.entries.pop(&k);
            }
        }

        store.entries.put(
            key,
            Entry {
                value,
                inserted: now,
            },
        );
    }

    /// Returns the cached value for `key`, or awaits `fetch` and caches it on success.
    pub async fn get_or_try_fetch<E, F>(&self, key: String, fetch: F) -> Result<V, E>
    where
        F: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(hit);
        }
        let value = fetch.await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        CacheStats {
            hits: store.hits,
            misses: store.misses,
            entries: store.entries.len(),
        }
    }
}

/// Builds a canonical key: `scope?k1=v1&k2=v2` with parameters sorted by name.
///
/// Credentials must not be passed in `params`.
pub fn cache_key(scope: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1)));

    let mut key = String::from(scope);
    for (i, (name, value)) in sorted.into_iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(name);
        key.push('=');
        key.push_str(&value.replace('&', "%26"));
    }
    key
}
