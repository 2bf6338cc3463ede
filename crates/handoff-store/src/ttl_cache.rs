//! Keyed map whose entries carry their own expiry deadline.
//!
//! Expiry is checked on every read, so an expired entry is never returned even
//! if the background sweep has not run yet. [`TtlCache::purge_expired`] only
//! reclaims memory.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, expiring `ttl` from now.
    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    /// Inserts only when no live entry exists. Returns false if one does.
    pub async fn insert_new(&self, key: K, value: V, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(&key).is_some_and(|e| e.is_live(now)) {
            return false;
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        true
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    /// Applies `f` to the live value for `key`, or to `init()` when there is
    /// none, and resets the deadline to `ttl` from now.
    pub async fn upsert<R>(
        &self,
        key: K,
        ttl: Duration,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = match entries.entry(key) {
            MapEntry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if !entry.is_live(now) {
                    entry.value = init();
                }
                entry
            }
            MapEntry::Vacant(vacant) => vacant.insert(Entry {
                value: init(),
                expires_at: now,
            }),
        };
        entry.expires_at = now + ttl;
        f(&mut entry.value)
    }

    /// Reads the live value for `key` in place. Returns `None` if there is no
    /// live entry.
    pub async fn read_with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| f(&e.value))
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .write()
            .await
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value)
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
