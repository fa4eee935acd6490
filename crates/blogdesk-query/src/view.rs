//! A mounted list view: controller, fetcher and displayed state together
//!
//! [`ListView::sync`] is the whole read path. It settles the debounced
//! search, derives the current key, serves a fresh cached page when there is
//! one and otherwise issues (or joins) a request, applies the result only if
//! the key is still current, and reconciles pagination against the server
//! count. A page moved by reconciliation changes the key, which the next
//! `sync` picks up.
//!
//! The read path is also available in two halves, [`ListView::prepare`] and
//! [`ListView::complete`], for callers that drive several requests at once.

use crate::cache::{CacheHit, Freshness};
use crate::controller::ListController;
use crate::error::FetchResult;
use crate::fetcher::{ListQuery, RemoteListFetcher, Ticket};
use crate::key::ListQueryKey;
use crate::result::{FetchState, ListResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// What a call to [`ListView::sync`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to do for the current key
    Unchanged,
    /// Showed a fresh cached page without a request
    Cached,
    /// Fetched and showed a page
    Fetched {
        /// Reconciliation moved the page; another sync will fetch it
        clamped: bool,
    },
    /// The request failed; pagination is untouched
    Failed,
    /// The result arrived for a key that is no longer current
    Discarded,
}

/// Next step for the current key
pub enum Prepared<T> {
    /// Nothing to do
    Unchanged,
    /// A fresh cached page is now shown
    Cached,
    /// A request must run
    Fetch(PendingFetch<T>),
}

impl<T> fmt::Debug for Prepared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("Unchanged"),
            Self::Cached => f.write_str("Cached"),
            Self::Fetch(pending) => f.debug_tuple("Fetch").field(pending.key()).finish(),
        }
    }
}

/// A request issued for a view, not yet awaited
pub struct PendingFetch<T> {
    ticket: Ticket,
    request: BoxFuture<'static, FetchResult<Arc<ListResult<T>>>>,
}

impl<T> PendingFetch<T> {
    /// Key being fetched
    #[must_use]
    pub const fn key(&self) -> &ListQueryKey {
        self.ticket.key()
    }

    /// Wait for the request to finish
    pub async fn finish(self) -> FetchedPage<T> {
        FetchedPage {
            outcome: self.request.await,
            ticket: self.ticket,
        }
    }
}

impl<T> fmt::Debug for PendingFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("key", self.key())
            .finish_non_exhaustive()
    }
}

/// A finished request waiting to be applied to its view
#[derive(Debug)]
pub struct FetchedPage<T> {
    ticket: Ticket,
    outcome: FetchResult<Arc<ListResult<T>>>,
}

impl<T> FetchedPage<T> {
    /// Key that was fetched
    #[must_use]
    pub const fn key(&self) -> &ListQueryKey {
        self.ticket.key()
    }
}

/// One mounted list view over resource items of type `T`
#[derive(Debug)]
pub struct ListView<T> {
    controller: ListController,
    query: ListQuery<T>,
    fetcher: RemoteListFetcher,
}

impl<T> ListView<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Mount a view; nothing is fetched until the first sync
    #[must_use]
    pub const fn new(controller: ListController, fetcher: RemoteListFetcher) -> Self {
        Self {
            controller,
            query: ListQuery::new(),
            fetcher,
        }
    }

    /// The view's parameters
    #[must_use]
    pub const fn controller(&self) -> &ListController {
        &self.controller
    }

    /// Change the view's parameters; takes effect on the next sync
    pub const fn controller_mut(&mut self) -> &mut ListController {
        &mut self.controller
    }

    /// What the view shows
    #[must_use]
    pub const fn state(&self) -> &FetchState<T> {
        self.query.state()
    }

    /// Key the displayed state belongs to
    #[must_use]
    pub const fn shown_key(&self) -> Option<&ListQueryKey> {
        self.query.current_key()
    }

    /// Bring the displayed state in line with the controller
    pub async fn sync(&mut self) -> SyncOutcome {
        match self.prepare(Instant::now()) {
            Prepared::Unchanged => SyncOutcome::Unchanged,
            Prepared::Cached => SyncOutcome::Cached,
            Prepared::Fetch(pending) => {
                let fetched = pending.finish().await;
                self.complete(fetched)
            }
        }
    }

    /// Sync until the view is stable, at most `max_rounds` times
    ///
    /// Covers the fetch that follows a clamped page. Returns the last outcome.
    pub async fn settle(&mut self, max_rounds: usize) -> SyncOutcome {
        let mut last = SyncOutcome::Unchanged;
        for _ in 0..max_rounds {
            let outcome = self.sync().await;
            match outcome {
                SyncOutcome::Fetched { clamped: true } => last = outcome,
                SyncOutcome::Unchanged => break,
                _ => {
                    last = outcome;
                    if self.shown_key() == Some(&self.controller.current_key()) {
                        break;
                    }
                }
            }
        }
        last
    }

    /// Refetch the current key regardless of cache freshness
    ///
    /// This is the explicit retry out of the error state.
    pub async fn refresh(&mut self) -> SyncOutcome {
        self.controller.poll_search(Instant::now());
        let key = self.controller.current_key();
        let fetched = self.request(key).finish().await;
        self.complete(fetched)
    }

    /// Decide what the current key needs at `now`
    ///
    /// A new key is served from a fresh cached page when one exists; a stale
    /// one is shown while it refetches. An unchanged key refetches only after
    /// an invalidation or eviction. An error for an unchanged key stays until
    /// [`refresh`](Self::refresh) or a key change.
    pub fn prepare(&mut self, now: Instant) -> Prepared<T> {
        self.controller.poll_search(now);
        let key = self.controller.current_key();
        let hit: Option<CacheHit<T>> = self.fetcher.cached(&key, now);

        if self.query.current_key() == Some(&key) {
            let refetch = match (self.query.state(), &hit) {
                (FetchState::Error(_), _) => false,
                (FetchState::Pending, _) | (FetchState::Success(_), None) => true,
                (FetchState::Success(_), Some(hit)) => hit.freshness == Freshness::Invalidated,
            };
            if !refetch {
                return Prepared::Unchanged;
            }
        } else if let Some(hit) = hit {
            let fresh = hit.is_fresh();
            self.controller.observe(&hit.value);
            self.query.show_cached(key.clone(), hit.value);
            if fresh {
                debug!(%key, "Serving fresh cached page");
                return Prepared::Cached;
            }
            debug!(%key, "Showing stale cached page while refetching");
        }

        Prepared::Fetch(self.request(key))
    }

    fn request(&mut self, key: ListQueryKey) -> PendingFetch<T> {
        let ticket = self.query.begin(key.clone());
        let fetcher = self.fetcher.clone();
        let request = async move { fetcher.load::<T>(&key).await }.boxed();
        PendingFetch { ticket, request }
    }

    /// Apply a finished request if its key is still current
    pub fn complete(&mut self, fetched: FetchedPage<T>) -> SyncOutcome {
        let FetchedPage { ticket, outcome } = fetched;
        let page = outcome.as_ref().ok().map(Arc::clone);

        if !self.query.apply(&ticket, outcome) {
            return SyncOutcome::Discarded;
        }

        match page {
            Some(page) => SyncOutcome::Fetched {
                clamped: self.controller.observe(&page).clamped(),
            },
            None => SyncOutcome::Failed,
        }
    }

    /// Drop pending search input; the view is going away
    pub fn unmount(&mut self) {
        self.controller.cancel_search();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::error::FetchError;
    use crate::fetcher::RetryPolicy;
    use crate::invalidation::InvalidationBus;
    use crate::key::QueryPrefix;
    use crate::mock::MockListSource;
    use blogdesk_core::SortOrder;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    const WINDOW: Duration = Duration::from_millis(500);

    struct Harness {
        source: Arc<MockListSource>,
        fetcher: RemoteListFetcher,
        bus: InvalidationBus,
    }

    impl Harness {
        fn new(source: MockListSource) -> Self {
            crate::init_test_logging();
            let source = Arc::new(source);
            let cache = Arc::new(QueryCache::default());
            let fetcher = RemoteListFetcher::new(source.clone(), cache.clone())
                .with_retry(RetryPolicy::none());
            Self {
                source,
                fetcher,
                bus: InvalidationBus::new(cache),
            }
        }

        fn view(&self) -> ListView<u32> {
            ListView::new(
                ListController::new("items", 10, SortOrder::Ascending, WINDOW),
                self.fetcher.clone(),
            )
        }
    }

    fn numbers(n: u32) -> Vec<serde_json::Value> {
        (1..=n).map(|i| json!(i)).collect()
    }

    fn shown(view: &ListView<u32>) -> Vec<u32> {
        view.state().data().unwrap().results.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sync_fetches_and_reconciles() {
        let harness = Harness::new(MockListSource::new().with_items("items", numbers(23)));
        let mut view = harness.view();

        assert_eq!(view.sync().await, SyncOutcome::Fetched { clamped: false });
        assert_eq!(shown(&view), (1..=10).collect::<Vec<_>>());
        assert_eq!(view.controller().page_label(), "Page 1 of 3");
        assert_eq!(view.sync().await, SyncOutcome::Unchanged);
        assert_eq!(harness.source.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_on_last_page_clamps_back() {
        let harness = Harness::new(MockListSource::new().with_items("items", numbers(23)));
        let mut view = harness.view();
        view.sync().await;

        view.controller_mut().last_page();
        view.sync().await;
        assert_eq!(shown(&view), vec![21, 22, 23]);

        // one deletion still leaves three pages
        harness.source.remove_where("items", |v| v == &json!(23));
        harness.bus.invalidate(&[QueryPrefix::new("items")]);
        assert_eq!(view.sync().await, SyncOutcome::Fetched { clamped: false });
        assert_eq!(shown(&view), vec![21, 22]);
        assert_eq!(view.controller().pagination().page(), 3);

        // emptying the last page clamps to page 2, which the next sync fetches
        harness.source.remove_where("items", |v| v.as_u64().is_some_and(|n| n > 20));
        harness.bus.invalidate(&[QueryPrefix::new("items")]);
        assert_eq!(view.sync().await, SyncOutcome::Fetched { clamped: true });
        assert_eq!(view.controller().pagination().page(), 2);
        assert_eq!(view.controller().pagination().total_pages(), 2);

        assert_eq!(view.sync().await, SyncOutcome::Fetched { clamped: false });
        assert_eq!(shown(&view), (11..=20).collect::<Vec<_>>());
        assert_eq!(view.controller().current_key().page().offset(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_for_old_page_is_discarded() {
        let harness = Harness::new(
            MockListSource::new()
                .with_items("items", numbers(30))
                .with_latency(Duration::from_millis(100)),
        );
        let mut view = harness.view();

        let Prepared::Fetch(first) = view.prepare(Instant::now()) else {
            panic!("expected a request for page 1");
        };
        view.controller_mut().set_page(2);
        let Prepared::Fetch(second) = view.prepare(Instant::now()) else {
            panic!("expected a request for page 2");
        };

        let (first, second) = tokio::join!(first.finish(), second.finish());

        assert!(matches!(view.complete(second), SyncOutcome::Fetched { .. }));
        assert_eq!(view.complete(first), SyncOutcome::Discarded);
        assert_eq!(shown(&view), (11..=20).collect::<Vec<_>>());
        assert_eq!(view.shown_key(), Some(&view.controller().current_key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_typing_fetches_once() {
        let harness = Harness::new(
            MockListSource::new().with_items("items", vec![json!("abc"), json!("xyz")]),
        );
        let mut view: ListView<serde_json::Value> = ListView::new(
            ListController::new("items", 10, SortOrder::Ascending, WINDOW),
            harness.fetcher.clone(),
        );
        view.sync().await;

        for term in ["a", "ab", "abc"] {
            view.controller_mut().set_search_term(term, Instant::now());
            assert_eq!(view.sync().await, SyncOutcome::Unchanged);
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        tokio::time::advance(WINDOW).await;
        assert_eq!(view.sync().await, SyncOutcome::Fetched { clamped: false });

        let searches: Vec<_> = harness
            .source
            .requests()
            .iter()
            .filter_map(|(_, params)| params.get("search").map(ToString::to_string))
            .collect();
        assert_eq!(searches, vec!["abc".to_string()]);
        assert_eq!(view.state().data().unwrap().results, vec![json!("abc")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_is_reused_across_mounts() {
        let harness = Harness::new(
            MockListSource::new()
                .with_items("items", numbers(5))
                .with_stale_time("items", Duration::from_secs(300)),
        );

        let mut first = harness.view();
        first.sync().await;
        first.unmount();

        let mut second = harness.view();
        assert_eq!(second.sync().await, SyncOutcome::Cached);
        assert_eq!(shown(&second), vec![1, 2, 3, 4, 5]);
        assert_eq!(harness.source.call_count(), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        let mut third = harness.view();
        assert_eq!(third.sync().await, SyncOutcome::Fetched { clamped: false });
        assert_eq!(harness.source.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stays_until_refresh() {
        let harness = Harness::new(MockListSource::new().with_items("items", numbers(5)));
        harness.source.fail_next(FetchError::Status {
            status: 404,
            message: "Not found.".into(),
        });
        let mut view = harness.view();

        assert_eq!(view.sync().await, SyncOutcome::Failed);
        assert_eq!(
            view.state().error().unwrap().to_string(),
            "API returned 404: Not found."
        );
        assert_eq!(view.controller().pagination().total_pages(), 0);

        assert_eq!(view.sync().await, SyncOutcome::Unchanged);
        assert_eq!(harness.source.call_count(), 1);

        assert_eq!(view.refresh().await, SyncOutcome::Fetched { clamped: false });
        assert_eq!(shown(&view), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_flight_refetches_next_read() {
        let harness = Harness::new(
            MockListSource::new()
                .with_items("items", numbers(5))
                .with_stale_time("items", Duration::from_secs(300))
                .with_latency(Duration::from_millis(200)),
        );
        let mut view = harness.view();

        let Prepared::Fetch(pending) = view.prepare(Instant::now()) else {
            panic!("expected a request");
        };
        let bus = harness.bus.clone();
        let (fetched, ()) = tokio::join!(pending.finish(), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            bus.invalidate(&[QueryPrefix::new("items")]);
        });

        assert!(matches!(view.complete(fetched), SyncOutcome::Fetched { .. }));
        assert_eq!(harness.source.call_count(), 1);

        assert!(matches!(view.sync().await, SyncOutcome::Fetched { .. }));
        assert_eq!(harness.source.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_follows_clamp() {
        let harness = Harness::new(MockListSource::new().with_items("items", numbers(12)));
        let mut view = harness.view();
        view.controller_mut().set_page(7);

        assert_eq!(view.settle(4).await, SyncOutcome::Fetched { clamped: false });
        assert_eq!(view.controller().pagination().page(), 2);
        assert_eq!(shown(&view), vec![11, 12]);
    }
}
