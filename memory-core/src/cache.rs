//! Shared in-memory LRU cache for memory items: capacity 200, TTL 5
//! minutes, refresh-on-read. Any write that changes an item invalidates
//! that identifier (spec.md §5, "Shared resources").

use std::num::NonZeroUsize;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::types::MemoryItem;

struct Entry {
    item: MemoryItem,
    inserted_at: Instant,
}

pub struct ItemCache {
    inner: Mutex<LruCache<Uuid, Entry>>,
    ttl: std::time::Duration,
}

impl ItemCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: std::time::Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            crate::constants::cache::CAPACITY,
            crate::constants::cache::TTL,
        )
    }

    /// Look up an item. Returns `None` on a miss or if the cached entry has
    /// aged past the TTL; a found entry is promoted as most-recently-used
    /// (refresh-on-read).
    pub fn get(&self, id: &Uuid) -> Option<MemoryItem> {
        let mut cache = self.inner.lock();
        let expired = cache
            .get(id)
            .is_some_and(|entry| entry.inserted_at.elapsed() > self.ttl);

        if expired {
            cache.pop(id);
            return None;
        }

        cache.get(id).map(|entry| entry.item.clone())
    }

    pub fn put(&self, item: MemoryItem) {
        let mut cache = self.inner.lock();
        cache.put(
            item.id,
            Entry {
                item,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, id: &Uuid) {
        self.inner.lock().pop(id);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemKind, ItemStatus, Source};

    fn sample_item(id: Uuid) -> MemoryItem {
        MemoryItem {
            id,
            tenant: "t".into(),
            project: "p".into(),
            kind: ItemKind::Fact,
            title: "Title".into(),
            content: "Content".into(),
            tags: vec![],
            verified: false,
            confidence: 0.5,
            usefulness_score: 0.0,
            error_count: 0,
            version: 1,
            status: ItemStatus::Active,
            status_reason: None,
            content_hash: "hash".into(),
            embedding: None,
            provenance: serde_json::json!({}),
            source: Source::Agent,
            created_at: 0,
            updated_at: 0,
            last_used_at: None,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ItemCache::new(10, std::time::Duration::from_secs(60));
        let id = Uuid::new_v4();
        cache.put(sample_item(id));
        assert!(cache.get(&id).is_some());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ItemCache::new(10, std::time::Duration::from_secs(60));
        let id = Uuid::new_v4();
        cache.put(sample_item(id));
        cache.invalidate(&id);
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let cache = ItemCache::new(10, std::time::Duration::from_millis(1));
        let id = Uuid::new_v4();
        cache.put(sample_item(id));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ItemCache::new(1, std::time::Duration::from_secs(60));
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        cache.put(sample_item(id_a));
        cache.put(sample_item(id_b));
        assert!(cache.get(&id_a).is_none());
        assert!(cache.get(&id_b).is_some());
    }
}
