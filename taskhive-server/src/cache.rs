//! Per-entity read-through cache
//!
//! A bounded, TTL'd map in front of the hot lookup-by-id paths
//! (challenges, users). Write paths invalidate the touched id; stale
//! and over-capacity entries are pruned on insert.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    inserted: Instant,
}

/// Bounded TTL cache keyed by entity id
pub struct EntityCache<T> {
    entries: RwLock<HashMap<i64, Entry<T>>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone> EntityCache<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached value, ignoring expired entries.
    pub async fn get(&self, id: i64) -> Option<T> {
        let entries = self.entries.read().await;
        match entries.get(&id) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Read-through lookup: serve from cache or run the loader and
    /// cache its hit. A loader returning `Ok(None)` is not cached, so
    /// a later insert of that id is seen immediately.
    pub async fn get_or_load<F, Fut, E>(&self, id: i64, loader: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(value) = self.get(id).await {
            return Ok(Some(value));
        }
        let loaded = loader().await?;
        if let Some(value) = &loaded {
            self.insert(id, value.clone()).await;
        }
        Ok(loaded)
    }

    /// Insert or replace an entry, pruning if over capacity.
    pub async fn insert(&self, id: i64, value: T) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(&id) {
            Self::prune(&mut entries, self.ttl, self.capacity);
        }
        entries.insert(
            id,
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    /// Drop one id. Called by every write path that touches the entity.
    pub async fn invalidate(&self, id: i64) {
        self.entries.write().await.remove(&id);
    }

    /// Drop everything.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// (hits, misses) since startup, for periodic logging.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Remove expired entries; if none were expired, evict the oldest
    /// entry to make room.
    fn prune(entries: &mut HashMap<i64, Entry<T>>, ttl: Duration, capacity: usize) {
        entries.retain(|_, entry| entry.inserted.elapsed() < ttl);
        while entries.len() >= capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => entries.remove(&id),
                None => break,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn cache(capacity: usize, ttl_ms: u64) -> EntityCache<String> {
        EntityCache::new(capacity, Duration::from_millis(ttl_ms))
    }

    #[tokio::test]
    async fn read_through_loads_once() {
        let cache = cache(10, 60_000);
        let mut loads = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_load(1, || {
                    loads += 1;
                    async { Ok::<_, Infallible>(Some("challenge".to_owned())) }
                })
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("challenge"));
        }
        assert_eq!(loads, 1);
    }

    #[tokio::test]
    async fn missing_rows_are_not_cached() {
        let cache = cache(10, 60_000);

        let value = cache
            .get_or_load(7, || async { Ok::<_, Infallible>(None) })
            .await
            .unwrap();
        assert!(value.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = cache(10, 60_000);
        cache.insert(1, "old".to_owned()).await;
        cache.invalidate(1).await;

        let value = cache
            .get_or_load(1, || async { Ok::<_, Infallible>(Some("new".to_owned())) })
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = cache(10, 10);
        cache.insert(1, "soon stale".to_owned()).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get(1).await.is_none());
    }

    #[tokio::test]
    async fn capacity_is_bounded() {
        let cache = cache(3, 60_000);
        for id in 0..10 {
            cache.insert(id, format!("entity-{}", id)).await;
        }
        assert!(cache.len().await <= 3);
        // the most recent insert survives
        assert_eq!(cache.get(9).await.as_deref(), Some("entity-9"));
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let cache = cache(10, 60_000);
        cache.insert(1, "x".to_owned()).await;
        cache.get(1).await;
        cache.get(2).await;

        let (hits, misses) = cache.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
    }
}
