//! Remote list fetching with de-duplication, retry and last-key-wins
//!
//! [`RemoteListFetcher`] turns a [`ListQueryKey`] into a network request
//! through a [`ListSource`], shares one in-flight request between every
//! caller asking for the same key, retries transient failures on a fixed
//! delay, and stores successful pages in the injected [`QueryCache`].
//!
//! [`ListQuery`] is the per-view guard that decides whether a completed
//! request may still be shown: only a result for the view's current key is
//! applied.

use crate::cache::{CacheHit, CachedValue, QueryCache};
use crate::error::{FetchError, FetchResult};
use crate::key::ListQueryKey;
use crate::params::ListParams;
use crate::result::{FetchState, ListResult};
use async_trait::async_trait;
use blogdesk_core::QueryConfig;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Where list pages come from
#[async_trait]
pub trait ListSource: Send + Sync {
    /// Fetch the raw JSON body of one page of `resource`
    async fn fetch_list(&self, resource: &str, params: &ListParams) -> FetchResult<serde_json::Value>;

    /// Staleness window declared for `resource`, if it has one
    fn stale_time(&self, _resource: &str) -> Option<Duration> {
        None
    }
}

/// Fixed-delay retry of transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    /// Never retry
    #[must_use]
    pub const fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Retry `retries` times, waiting `delay` before each
    #[must_use]
    pub const fn fixed(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Policy from the `query` configuration section
    #[must_use]
    pub const fn from_config(config: &QueryConfig) -> Self {
        Self::fixed(config.retry_attempts, config.retry_delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

type SharedFetch = Shared<BoxFuture<'static, FetchResult<CachedValue>>>;

/// A registered request; weak so that it dies with its last caller
struct InFlight {
    id: u64,
    request: WeakShared<BoxFuture<'static, FetchResult<CachedValue>>>,
}

/// Fetches list pages, sharing in-flight requests and filling the cache
#[derive(Clone)]
pub struct RemoteListFetcher {
    source: Arc<dyn ListSource>,
    cache: Arc<QueryCache>,
    in_flight: Arc<DashMap<ListQueryKey, InFlight>>,
    next_id: Arc<AtomicU64>,
    retry: RetryPolicy,
    default_stale_time: Duration,
}

impl fmt::Debug for RemoteListFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteListFetcher")
            .field("cache_entries", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .field("retry", &self.retry)
            .field("default_stale_time", &self.default_stale_time)
            .finish_non_exhaustive()
    }
}

impl RemoteListFetcher {
    /// Create a fetcher over `source` that fills `cache`
    pub fn new(source: Arc<dyn ListSource>, cache: Arc<QueryCache>) -> Self {
        Self {
            source,
            cache,
            in_flight: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
            retry: RetryPolicy::default(),
            default_stale_time: Duration::ZERO,
        }
    }

    /// Create a fetcher configured from the `query` section
    pub fn from_config(source: Arc<dyn ListSource>, cache: Arc<QueryCache>, config: &QueryConfig) -> Self {
        Self::new(source, cache)
            .with_retry(RetryPolicy::from_config(config))
            .with_default_stale_time(config.default_stale_time())
    }

    /// Replace the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Staleness window for resources the source declares none for
    #[must_use]
    pub const fn with_default_stale_time(mut self, stale_time: Duration) -> Self {
        self.default_stale_time = stale_time;
        self
    }

    /// The cache this fetcher fills
    #[must_use]
    pub const fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Cached page for `key`, if one is stored
    #[must_use]
    pub fn cached<T>(&self, key: &ListQueryKey, now: Instant) -> Option<CacheHit<T>>
    where
        T: Send + Sync + 'static,
    {
        self.cache.get(key, now)
    }

    /// Number of distinct requests currently in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let handles: Vec<_> = self
            .in_flight
            .iter()
            .map(|entry| entry.request.clone())
            .collect();
        handles
            .iter()
            .filter(|request| request.upgrade().is_some())
            .count()
    }

    /// Fetch `key` from the source, joining an identical in-flight request
    ///
    /// Always goes to the network (or joins a request already there); whether
    /// a cached page is good enough is the caller's decision.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or immediately for
    /// non-retryable failures.
    pub async fn load<T>(&self, key: &ListQueryKey) -> FetchResult<Arc<ListResult<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let request = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(request) = entry.get().request.upgrade() {
                    debug!(%key, "Joining in-flight request");
                    request
                } else {
                    let (registered, request) = self.start::<T>(key);
                    match registered {
                        Some(registered) => {
                            entry.insert(registered);
                        }
                        None => {
                            entry.remove();
                        }
                    }
                    request
                }
            }
            Entry::Vacant(entry) => {
                let (registered, request) = self.start::<T>(key);
                if let Some(registered) = registered {
                    entry.insert(registered);
                }
                request
            }
        };

        request.await?.downcast::<ListResult<T>>().map_err(|_| {
            FetchError::decode(format!("page for {key} was requested with a different item type"))
        })
    }

    /// Build a shared request for `key` and the handle to register for it
    ///
    /// The handle is `None` only for a request that already finished.
    fn start<T>(&self, key: &ListQueryKey) -> (Option<InFlight>, SharedFetch)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = self.clone().run::<T>(key.clone(), id).boxed().shared();
        let registered = request.downgrade().map(|weak| InFlight { id, request: weak });
        (registered, request)
    }

    async fn run<T>(self, key: ListQueryKey, id: u64) -> FetchResult<CachedValue>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.cache.begin_fetch(&key);
        let mut guard = FetchGuard {
            fetcher: &self,
            key: &key,
            id,
            settled: false,
        };
        let outcome = self.fetch_page::<T>(&key).await;

        match &outcome {
            Ok(value) => {
                let stale_time = self
                    .source
                    .stale_time(key.resource())
                    .unwrap_or(self.default_stale_time);
                self.cache
                    .store(key.clone(), Arc::clone(value), stale_time, Instant::now());
            }
            Err(err) => {
                self.cache.abandon_fetch(&key);
                warn!(%key, error = %err, "List request failed");
            }
        }

        guard.settled = true;
        drop(guard);
        outcome
    }

    async fn fetch_page<T>(&self, key: &ListQueryKey) -> FetchResult<CachedValue>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let params = ListParams::from_key(key);
        let body = self.fetch_with_retry(key, &params).await?;
        let page: ListResult<T> = serde_json::from_value(body)?;
        debug!(%key, count = page.count, items = page.len(), "Fetched list page");
        Ok(Arc::new(page))
    }

    async fn fetch_with_retry(
        &self,
        key: &ListQueryKey,
        params: &ListParams,
    ) -> FetchResult<serde_json::Value> {
        let mut attempt = 0;
        loop {
            match self.source.fetch_list(key.resource(), params).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.retry.retries => {
                    attempt += 1;
                    warn!(
                        %key,
                        attempt,
                        retries = self.retry.retries,
                        error = %err,
                        "List request failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Unregisters a request when its future is dropped
///
/// A request every caller gave up on is dropped mid-flight; the guard then
/// clears its in-flight markers so the next load starts afresh.
struct FetchGuard<'a> {
    fetcher: &'a RemoteListFetcher,
    key: &'a ListQueryKey,
    id: u64,
    settled: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let removed = self
            .fetcher
            .in_flight
            .remove_if(self.key, |_, registered| registered.id == self.id)
            .is_some();
        if removed && !self.settled {
            self.fetcher.cache.abandon_fetch(self.key);
            debug!(key = %self.key, "List request dropped before completion");
        }
    }
}

/// Proof that a request was issued for a particular key
#[derive(Debug, Clone)]
pub struct Ticket {
    key: ListQueryKey,
    seq: u64,
}

impl Ticket {
    /// Key the request was issued for
    #[must_use]
    pub const fn key(&self) -> &ListQueryKey {
        &self.key
    }
}

/// Observable state of one list view, guarded by last-key-wins
#[derive(Debug)]
pub struct ListQuery<T> {
    current: Option<ListQueryKey>,
    issued: u64,
    applied: u64,
    state: FetchState<T>,
}

impl<T> ListQuery<T> {
    /// No key requested yet
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
            issued: 0,
            applied: 0,
            state: FetchState::Pending,
        }
    }

    /// The key whose data this view shows or waits for
    #[must_use]
    pub const fn current_key(&self) -> Option<&ListQueryKey> {
        self.current.as_ref()
    }

    /// What the view shows
    #[must_use]
    pub const fn state(&self) -> &FetchState<T> {
        &self.state
    }

    /// Record that a request for `key` is starting
    ///
    /// Switching to a new key shows `Pending`; refetching the current key
    /// keeps showing its data until the new page arrives.
    pub fn begin(&mut self, key: ListQueryKey) -> Ticket {
        self.issued += 1;
        if self.current.as_ref() != Some(&key) {
            self.state = FetchState::Pending;
            self.current = Some(key.clone());
        }
        Ticket {
            key,
            seq: self.issued,
        }
    }

    /// Show a cached page for `key` without a request
    pub fn show_cached(&mut self, key: ListQueryKey, page: Arc<ListResult<T>>) {
        self.issued += 1;
        self.applied = self.issued;
        self.current = Some(key);
        self.state = FetchState::Success(page);
    }

    /// Apply a completed request
    ///
    /// Returns `false`, leaving the state untouched, when the ticket's key is
    /// no longer current or a later result for it was already applied.
    pub fn apply(&mut self, ticket: &Ticket, outcome: FetchResult<Arc<ListResult<T>>>) -> bool {
        if self.current.as_ref() != Some(&ticket.key) || ticket.seq < self.applied {
            debug!(key = %ticket.key, "Discarding result for superseded key");
            return false;
        }

        self.applied = ticket.seq;
        self.state = match outcome {
            Ok(page) => FetchState::Success(page),
            Err(err) => FetchState::Error(err),
        };
        true
    }
}

impl<T> Default for ListQuery<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cache::Freshness;
    use crate::key::QueryPrefix;
    use crate::mock::MockListSource;
    use crate::pagination::PageKey;
    use blogdesk_core::SortOrder;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn key(resource: &str, page: u32) -> ListQueryKey {
        ListQueryKey::new(
            resource,
            PageKey {
                page,
                limit: 10,
                order: SortOrder::Ascending,
            },
        )
    }

    fn numbers(n: u32) -> Vec<serde_json::Value> {
        (1..=n).map(|i| json!(i)).collect()
    }

    fn fetcher(source: &Arc<MockListSource>) -> RemoteListFetcher {
        RemoteListFetcher::new(source.clone(), Arc::new(QueryCache::default()))
            .with_retry(RetryPolicy::fixed(3, Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_fills_cache() {
        let source = Arc::new(MockListSource::new().with_items("items", numbers(23)));
        let fetcher = fetcher(&source);

        let page = fetcher.load::<u32>(&key("items", 3)).await.unwrap();

        assert_eq!(page.count, 23);
        assert_eq!(page.results, vec![21, 22, 23]);
        assert!(fetcher.cached::<u32>(&key("items", 3), Instant::now()).is_some());
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_keys_share_one_request() {
        let source = Arc::new(
            MockListSource::new()
                .with_items("items", numbers(5))
                .with_latency(Duration::from_millis(200)),
        );
        let fetcher = fetcher(&source);
        let k = key("items", 1);

        let (a, b, c) = tokio::join!(
            fetcher.load::<u32>(&k),
            fetcher.load::<u32>(&k),
            fetcher.load::<u32>(&k)
        );

        assert_eq!(source.call_count(), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(c.unwrap().count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_are_not_shared() {
        let source = Arc::new(MockListSource::new().with_items("items", numbers(25)));
        let fetcher = fetcher(&source);

        let (k1, k2) = (key("items", 1), key("items", 2));
        let (a, b) = tokio::join!(
            fetcher.load::<u32>(&k1),
            fetcher.load::<u32>(&k2)
        );

        assert_eq!(source.call_count(), 2);
        assert_eq!(a.unwrap().results[0], 1);
        assert_eq!(b.unwrap().results[0], 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let source = Arc::new(MockListSource::new().with_items("items", numbers(3)));
        source.fail_next(FetchError::transport("connection reset"));
        source.fail_next(FetchError::Status {
            status: 503,
            message: "unavailable".into(),
        });
        let fetcher = fetcher(&source);

        let started = Instant::now();
        let page = fetcher.load::<u32>(&key("items", 1)).await.unwrap();

        assert_eq!(page.count, 3);
        assert_eq!(source.call_count(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let source = Arc::new(MockListSource::new().with_items("items", numbers(3)));
        for _ in 0..10 {
            source.fail_next(FetchError::transport("down"));
        }
        let fetcher = fetcher(&source);

        let err = fetcher.load::<u32>(&key("items", 1)).await.unwrap_err();

        assert_eq!(err, FetchError::transport("down"));
        assert_eq!(source.call_count(), 4);
        assert!(fetcher.cached::<u32>(&key("items", 1), Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let source = Arc::new(MockListSource::new());
        source.fail_next(FetchError::SessionExpired {
            message: "Invalid token.".into(),
        });
        let fetcher = fetcher(&source);

        let err = fetcher.load::<u32>(&key("items", 1)).await.unwrap_err();

        assert!(matches!(err, FetchError::SessionExpired { .. }));
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_declared_stale_time_is_used() {
        let source = Arc::new(
            MockListSource::new()
                .with_items("items", numbers(3))
                .with_stale_time("items", Duration::from_secs(60)),
        );
        let fetcher = fetcher(&source);
        let k = key("items", 1);

        fetcher.load::<u32>(&k).await.unwrap();
        assert_eq!(fetcher.cache().freshness(&k, Instant::now()), Some(Freshness::Fresh));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(fetcher.cache().freshness(&k, Instant::now()), Some(Freshness::Stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_while_in_flight() {
        let source = Arc::new(
            MockListSource::new()
                .with_items("items", numbers(3))
                .with_stale_time("items", Duration::from_secs(60))
                .with_latency(Duration::from_millis(500)),
        );
        let fetcher = fetcher(&source);
        let k = key("items", 1);

        let pending = tokio::spawn({
            let fetcher = fetcher.clone();
            let k = k.clone();
            async move { fetcher.load::<u32>(&k).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        fetcher.cache().invalidate(&[QueryPrefix::new("items")]);

        let page = pending.await.unwrap().unwrap();
        assert_eq!(page.count, 3, "in-flight request completes normally");
        assert_eq!(
            fetcher.cache().freshness(&k, Instant::now()),
            Some(Freshness::Invalidated)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_is_unregistered() {
        let source = Arc::new(
            MockListSource::new()
                .with_items("items", numbers(3))
                .with_latency(Duration::from_millis(500)),
        );
        let fetcher = fetcher(&source);
        let k = key("items", 1);

        let gave_up = tokio::time::timeout(Duration::from_millis(100), fetcher.load::<u32>(&k)).await;
        assert!(gave_up.is_err());
        assert_eq!(fetcher.in_flight(), 0);
        assert_eq!(fetcher.cache().fetches_in_flight(), 0);

        let page = fetcher.load::<u32>(&k).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(source.call_count(), 2);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[test]
    fn test_result_for_superseded_key_is_discarded() {
        let mut query: ListQuery<u32> = ListQuery::new();

        let first = query.begin(key("items", 1));
        let second = query.begin(key("items", 2));

        let newer = Arc::new(ListResult::complete(vec![11, 12]));
        assert!(query.apply(&second, Ok(newer)));

        let older = Arc::new(ListResult::complete(vec![1, 2]));
        assert!(!query.apply(&first, Ok(older)));

        assert_eq!(query.current_key(), Some(&key("items", 2)));
        assert_eq!(query.state().data().unwrap().results, vec![11, 12]);
    }

    #[test]
    fn test_late_result_for_reissued_key_does_not_overwrite() {
        let mut query: ListQuery<u32> = ListQuery::new();

        let stale = query.begin(key("items", 1));
        query.begin(key("items", 2));
        query.show_cached(key("items", 1), Arc::new(ListResult::complete(vec![7])));

        assert!(!query.apply(&stale, Ok(Arc::new(ListResult::complete(vec![1])))));
        assert_eq!(query.state().data().unwrap().results, vec![7]);
    }

    #[test]
    fn test_refetch_keeps_data_until_replaced() {
        let mut query: ListQuery<u32> = ListQuery::new();
        let ticket = query.begin(key("items", 1));
        query.apply(&ticket, Ok(Arc::new(ListResult::complete(vec![1]))));

        let refetch = query.begin(key("items", 1));
        assert!(query.state().data().is_some());

        assert!(query.apply(&refetch, Err(FetchError::transport("down"))));
        assert!(query.state().error().is_some());
    }
}
