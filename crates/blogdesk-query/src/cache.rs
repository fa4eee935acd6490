//! Injected, keyed cache of list pages
//!
//! One [`QueryCache`] is shared (behind an `Arc`) by every list view of a
//! session. Entries are type-erased so different resources can share it;
//! readers downcast back to the `ListResult<T>` they asked for.

use crate::key::{ListQueryKey, QueryPrefix};
use crate::result::ListResult;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A type-erased cached page
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// How usable a cached entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within its staleness window and not invalidated
    Fresh,
    /// Older than its staleness window
    Stale,
    /// Marked stale by a mutation
    Invalidated,
}

/// A typed cache lookup
#[derive(Debug)]
pub struct CacheHit<T> {
    /// The cached page
    pub value: Arc<ListResult<T>>,
    /// Whether it may be shown without refetching
    pub freshness: Freshness,
}

impl<T> CacheHit<T> {
    /// Whether the entry can be used without refetching
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }
}

struct CacheEntry {
    value: CachedValue,
    fetched_at: Instant,
    last_read: Instant,
    stale_time: Duration,
    invalidated: bool,
}

impl CacheEntry {
    fn freshness(&self, now: Instant) -> Freshness {
        if self.invalidated {
            Freshness::Invalidated
        } else if now.saturating_duration_since(self.fetched_at) < self.stale_time {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("fetched_at", &self.fetched_at)
            .field("stale_time", &self.stale_time)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}

/// Keyed store of list pages with staleness and invalidation
#[derive(Debug)]
pub struct QueryCache {
    entries: DashMap<ListQueryKey, CacheEntry>,
    /// Keys with a request in flight; `true` once an invalidation hit them
    in_flight: DashMap<ListQueryKey, bool>,
    /// Stores share it; an invalidation holds it exclusively so it never
    /// falls between a store's flag check and its insert
    gate: RwLock<()>,
    gc_time: Duration,
}

impl QueryCache {
    /// Create an empty cache that evicts entries unread for `gc_time`
    #[must_use]
    pub fn new(gc_time: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            gate: RwLock::new(()),
            gc_time,
        }
    }

    /// Look up `key` as a page of `T`
    ///
    /// Counts as a read for garbage collection. A stored page of a different
    /// item type is treated as a miss.
    #[must_use]
    pub fn get<T>(&self, key: &ListQueryKey, now: Instant) -> Option<CacheHit<T>>
    where
        T: Send + Sync + 'static,
    {
        let mut entry = self.entries.get_mut(key)?;
        entry.last_read = now;
        let freshness = entry.freshness(now);
        let value = Arc::clone(&entry.value).downcast::<ListResult<T>>().ok()?;
        trace!(%key, ?freshness, "Cache hit");
        Some(CacheHit { value, freshness })
    }

    /// Freshness of `key` without reading its value
    #[must_use]
    pub fn freshness(&self, key: &ListQueryKey, now: Instant) -> Option<Freshness> {
        self.entries.get(key).map(|entry| entry.freshness(now))
    }

    /// Note that a request for `key` has started
    pub fn begin_fetch(&self, key: &ListQueryKey) {
        self.in_flight.insert(key.clone(), false);
    }

    /// Drop the in-flight marker of a request that produced nothing
    pub fn abandon_fetch(&self, key: &ListQueryKey) {
        self.in_flight.remove(key);
    }

    /// Store a freshly fetched page
    ///
    /// If an invalidation hit `key` while its request was in flight, the page
    /// is stored already invalidated so the next read refetches.
    pub fn store(&self, key: ListQueryKey, value: CachedValue, stale_time: Duration, now: Instant) {
        let _gate = self.gate.read();
        let invalidated = self
            .in_flight
            .remove(&key)
            .is_some_and(|(_, dirty)| dirty);
        if invalidated {
            debug!(%key, "Stored result was invalidated while in flight");
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: now,
                last_read: now,
                stale_time,
                invalidated,
            },
        );
    }

    /// Insert a typed page directly
    pub fn insert<T>(&self, key: ListQueryKey, value: ListResult<T>, stale_time: Duration, now: Instant)
    where
        T: Send + Sync + 'static,
    {
        self.store(key, Arc::new(value), stale_time, now);
    }

    /// Mark every entry matching any of `prefixes` stale
    ///
    /// In-flight requests finish normally; their results land already stale.
    /// Returns how many stored entries were marked.
    pub fn invalidate(&self, prefixes: &[QueryPrefix]) -> usize {
        let hits = |key: &ListQueryKey| prefixes.iter().any(|prefix| prefix.matches(key));

        let gate = self.gate.write();
        let mut marked = 0;
        for mut entry in self.entries.iter_mut() {
            if hits(entry.key()) {
                entry.value_mut().invalidated = true;
                marked += 1;
            }
        }
        for mut pending in self.in_flight.iter_mut() {
            if hits(pending.key()) {
                *pending.value_mut() = true;
            }
        }
        drop(gate);

        debug!(
            prefixes = %prefixes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            marked,
            "Invalidated cache entries"
        );
        marked
    }

    /// Evict entries nobody has read for the garbage-collection window
    ///
    /// Returns how many entries were evicted.
    pub fn collect_garbage(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_read) < self.gc_time);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "Evicted unused cache entries");
        }
        evicted
    }

    /// Drop everything, e.g. on logout
    ///
    /// Requests still in flight store their pages when they finish.
    pub fn clear(&self) {
        self.entries.clear();
        self.in_flight.clear();
    }

    /// Number of keys with a request in flight
    #[must_use]
    pub fn fetches_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pagination::PageKey;
    use crate::key::ScopeSegment;
    use blogdesk_core::SortOrder;
    use pretty_assertions::assert_eq;
    use std::sync::Barrier;
    use std::thread;

    const MINUTE: Duration = Duration::from_secs(60);

    fn key(resource: &str, page: u32) -> ListQueryKey {
        ListQueryKey::new(
            resource,
            PageKey {
                page,
                limit: 10,
                order: SortOrder::Descending,
            },
        )
    }

    fn page(items: &[u32]) -> ListResult<u32> {
        ListResult::complete(items.to_vec())
    }

    #[test]
    fn test_fresh_within_window_then_stale() {
        let cache = QueryCache::default();
        let start = Instant::now();
        cache.insert(key("users", 1), page(&[1, 2]), MINUTE, start);

        let hit = cache.get::<u32>(&key("users", 1), start + Duration::from_secs(59)).unwrap();
        assert!(hit.is_fresh());
        assert_eq!(hit.value.results, vec![1, 2]);

        let hit = cache.get::<u32>(&key("users", 1), start + MINUTE).unwrap();
        assert_eq!(hit.freshness, Freshness::Stale);
    }

    #[test]
    fn test_zero_window_is_never_fresh() {
        let cache = QueryCache::default();
        let now = Instant::now();
        cache.insert(key("users", 1), page(&[1]), Duration::ZERO, now);
        assert_eq!(cache.freshness(&key("users", 1), now), Some(Freshness::Stale));
    }

    #[test]
    fn test_wrong_item_type_is_a_miss() {
        let cache = QueryCache::default();
        let now = Instant::now();
        cache.insert(key("users", 1), page(&[1]), MINUTE, now);
        assert!(cache.get::<String>(&key("users", 1), now).is_none());
    }

    #[test]
    fn test_invalidate_by_prefix() {
        let cache = QueryCache::default();
        let now = Instant::now();
        cache.insert(key("users", 1), page(&[1]), MINUTE, now);
        cache.insert(key("users", 2), page(&[2]), MINUTE, now);
        cache.insert(key("blogs", 1), page(&[3]), MINUTE, now);

        let marked = cache.invalidate(&[QueryPrefix::new("users")]);

        assert_eq!(marked, 2);
        assert_eq!(cache.freshness(&key("users", 1), now), Some(Freshness::Invalidated));
        assert_eq!(cache.freshness(&key("users", 2), now), Some(Freshness::Invalidated));
        assert_eq!(cache.freshness(&key("blogs", 1), now), Some(Freshness::Fresh));
    }

    #[test]
    fn test_scoped_invalidation_leaves_other_scopes() {
        let cache = QueryCache::default();
        let now = Instant::now();
        let mine = key("blogTopics", 1).with_scope(ScopeSegment::new("user_id", "1"));
        let theirs = key("blogTopics", 1).with_scope(ScopeSegment::new("user_id", "2"));
        cache.insert(mine.clone(), page(&[1]), MINUTE, now);
        cache.insert(theirs.clone(), page(&[2]), MINUTE, now);

        cache.invalidate(&[QueryPrefix::new("blogTopics").scoped("user_id", "1")]);

        assert_eq!(cache.freshness(&mine, now), Some(Freshness::Invalidated));
        assert_eq!(cache.freshness(&theirs, now), Some(Freshness::Fresh));
    }

    #[test]
    fn test_invalidation_during_flight_lands_stale() {
        let cache = QueryCache::default();
        let now = Instant::now();
        let users = key("users", 1);

        cache.begin_fetch(&users);
        assert_eq!(cache.invalidate(&[QueryPrefix::new("users")]), 0);
        cache.insert(users.clone(), page(&[1]), MINUTE, now);

        assert_eq!(cache.freshness(&users, now), Some(Freshness::Invalidated));
    }

    #[test]
    fn test_invalidation_racing_a_store_is_never_lost() {
        let cache = Arc::new(QueryCache::default());
        let now = Instant::now();
        for i in 0..2_000 {
            cache.insert(key("blogs", i + 1), page(&[i]), MINUTE, now);
        }
        let users = key("users", 1);
        let mut lost = 0;

        for _ in 0..500 {
            cache.begin_fetch(&users);
            let barrier = Barrier::new(2);
            thread::scope(|s| {
                s.spawn(|| {
                    barrier.wait();
                    cache.insert(users.clone(), page(&[1]), MINUTE, now);
                });
                s.spawn(|| {
                    barrier.wait();
                    cache.invalidate(&[QueryPrefix::new("users")]);
                });
            });
            if cache.freshness(&users, now) != Some(Freshness::Invalidated) {
                lost += 1;
            }
        }

        assert_eq!(lost, 0);
    }

    #[test]
    fn test_refetch_clears_invalidation() {
        let cache = QueryCache::default();
        let now = Instant::now();
        let users = key("users", 1);
        cache.insert(users.clone(), page(&[1]), MINUTE, now);
        cache.invalidate(&[QueryPrefix::new("users")]);

        cache.begin_fetch(&users);
        cache.insert(users.clone(), page(&[1, 2]), MINUTE, now);

        assert_eq!(cache.freshness(&users, now), Some(Freshness::Fresh));
    }

    #[test]
    fn test_collect_garbage_evicts_unread() {
        let cache = QueryCache::new(Duration::from_secs(300));
        let start = Instant::now();
        cache.insert(key("users", 1), page(&[1]), MINUTE, start);
        cache.insert(key("users", 2), page(&[2]), MINUTE, start);

        let _ = cache.get::<u32>(&key("users", 2), start + Duration::from_secs(200));

        let evicted = cache.collect_garbage(start + Duration::from_secs(301));
        assert_eq!(evicted, 1);
        assert!(cache.freshness(&key("users", 1), start).is_none());
        assert!(cache.freshness(&key("users", 2), start).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::default();
        cache.insert(key("users", 1), page(&[1]), MINUTE, Instant::now());
        assert!(!cache.is_empty());
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
