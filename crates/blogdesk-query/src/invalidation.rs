//! Mutation-driven cache invalidation

use crate::cache::QueryCache;
use crate::key::QueryPrefix;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

const SUBSCRIBER_BACKLOG: usize = 64;

/// Something whose success makes cached lists stale
pub trait Invalidates {
    /// Prefixes whose entries must be refetched on next read
    fn invalidates(&self) -> Vec<QueryPrefix>;
}

/// Marks cache entries stale and tells mounted views about it
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    cache: Arc<QueryCache>,
    notify: broadcast::Sender<Arc<[QueryPrefix]>>,
}

impl InvalidationBus {
    /// Create a bus over `cache`
    #[must_use]
    pub fn new(cache: Arc<QueryCache>) -> Self {
        let (notify, _) = broadcast::channel(SUBSCRIBER_BACKLOG);
        Self { cache, notify }
    }

    /// Mark every entry under `prefixes` stale
    ///
    /// Returns how many cached entries were marked.
    pub fn invalidate(&self, prefixes: &[QueryPrefix]) -> usize {
        if prefixes.is_empty() {
            return 0;
        }

        let marked = self.cache.invalidate(prefixes);
        // No subscribers is fine; the cache flag alone forces the refetch.
        let _ = self.notify.send(Arc::from(prefixes));
        marked
    }

    /// Invalidate everything a completed mutation declares
    pub fn publish<M>(&self, mutation: &M) -> usize
    where
        M: Invalidates + std::fmt::Debug + ?Sized,
    {
        let prefixes = mutation.invalidates();
        let marked = self.invalidate(&prefixes);
        info!(?mutation, marked, "Mutation succeeded, cached lists invalidated");
        marked
    }

    /// Receive every batch of invalidated prefixes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<[QueryPrefix]>> {
        self.notify.subscribe()
    }

    /// The cache this bus invalidates
    #[must_use]
    pub const fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }
}
