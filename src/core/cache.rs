use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// When cache entries stop being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationStrategy {
    /// Entries never expire; only `invalidate_all` removes them.
    Never,
    /// Entries are served strictly less than `ttl` after insertion.
    Ttl(Duration),
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Thread-safe keyed cache with lazy, per-cache expiration.
///
/// `get` is a pure read: an expired entry is simply not returned. Entries
/// that expire and are never overwritten stay allocated until
/// `invalidate_all`; there is no background sweeper.
pub struct Cache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    expiration: ExpirationStrategy,
}

impl<K: Eq + std::hash::Hash, V: Clone> Cache<K, V> {
    pub fn new(expiration: ExpirationStrategy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiration,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if self.is_fresh(entry) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Insert or replace, resetting the entry's age.
    pub fn set(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries.write().insert(key, entry);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        match self.expiration {
            ExpirationStrategy::Never => true,
            ExpirationStrategy::Ttl(ttl) => entry.inserted_at.elapsed() < ttl,
        }
    }
}
