//! In-memory list source for testing

use crate::error::{FetchError, FetchResult};
use crate::fetcher::ListSource;
use crate::params::ListParams;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Serves list pages out of in-memory datasets
///
/// Datasets are stored oldest first; `order=desc` reverses them. `search`
/// keeps items whose JSON text contains the term, case-insensitively.
#[derive(Debug, Default)]
pub struct MockListSource {
    /// Items per resource
    datasets: RwLock<HashMap<String, Vec<Value>>>,

    /// Declared staleness windows
    stale_times: HashMap<String, Duration>,

    /// Errors to return, in order, before serving data again
    failures: Mutex<VecDeque<FetchError>>,

    /// Simulated network latency
    latency: Duration,

    /// Every request received
    requests: Mutex<Vec<(String, ListParams)>>,

    calls: AtomicUsize,
}

impl MockListSource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `resource` with `items`
    #[must_use]
    pub fn with_items(self, resource: &str, items: Vec<Value>) -> Self {
        self.set_items(resource, items);
        self
    }

    /// Declare a staleness window for `resource`
    #[must_use]
    pub fn with_stale_time(mut self, resource: &str, stale_time: Duration) -> Self {
        self.stale_times.insert(resource.to_string(), stale_time);
        self
    }

    /// Delay every response
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Replace the items of `resource`
    pub fn set_items(&self, resource: &str, items: Vec<Value>) {
        self.datasets.write().insert(resource.to_string(), items);
    }

    /// Remove items of `resource` matching `predicate`, returning how many went
    pub fn remove_where(&self, resource: &str, predicate: impl Fn(&Value) -> bool) -> usize {
        let mut datasets = self.datasets.write();
        let Some(items) = datasets.get_mut(resource) else {
            return 0;
        };
        let before = items.len();
        items.retain(|item| !predicate(item));
        before - items.len()
    }

    /// Make the next request fail with `error`
    pub fn fail_next(&self, error: FetchError) {
        self.failures.lock().push_back(error);
    }

    /// Number of requests received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in order
    #[must_use]
    pub fn requests(&self) -> Vec<(String, ListParams)> {
        self.requests.lock().clone()
    }

    fn page(&self, resource: &str, params: &ListParams) -> Value {
        let mut items = self
            .datasets
            .read()
            .get(resource)
            .cloned()
            .unwrap_or_default();

        if let Some(term) = params.get("search") {
            let term = term.to_lowercase();
            items.retain(|item| item.to_string().to_lowercase().contains(&term));
        }
        if params.get("order") == Some("desc") {
            items.reverse();
        }

        let count = items.len();
        let offset = parse_param(params, "offset").unwrap_or(0);
        let limit = parse_param(params, "limit").unwrap_or(count);
        let end = offset.saturating_add(limit);

        let results: Vec<Value> = items.into_iter().skip(offset).take(limit).collect();
        let next = (end < count).then(|| format!("/{resource}?offset={end}&limit={limit}"));
        let previous = (offset > 0).then(|| {
            format!(
                "/{resource}?offset={}&limit={limit}",
                offset.saturating_sub(limit)
            )
        });

        json!({
            "count": count,
            "next": next,
            "previous": previous,
            "results": results,
        })
    }
}

fn parse_param(params: &ListParams, name: &str) -> Option<usize> {
    params.get(name).and_then(|value| value.parse().ok())
}

#[async_trait]
impl ListSource for MockListSource {
    async fn fetch_list(&self, resource: &str, params: &ListParams) -> FetchResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .push((resource.to_string(), params.clone()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failure = self.failures.lock().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(self.page(resource, params))
    }

    fn stale_time(&self, resource: &str) -> Option<Duration> {
        self.stale_times.get(resource).copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::key::ListQueryKey;
    use crate::pagination::PageKey;
    use blogdesk_core::SortOrder;
    use pretty_assertions::assert_eq;

    fn params(page: u32, order: SortOrder, search: &str) -> ListParams {
        ListParams::from_key(
            &ListQueryKey::new(
                "items",
                PageKey {
                    page,
                    limit: 2,
                    order,
                },
            )
            .with_search(search),
        )
    }

    #[tokio::test]
    async fn test_mock_pages_and_orders() {
        let source = MockListSource::new().with_items("items", (1..=5).map(|i| json!(i)).collect());

        let body = source
            .fetch_list("items", &params(1, SortOrder::Descending, ""))
            .await
            .unwrap();
        assert_eq!(body["count"], 5);
        assert_eq!(body["results"], json!([5, 4]));
        assert!(body["previous"].is_null());

        let body = source
            .fetch_list("items", &params(3, SortOrder::Ascending, ""))
            .await
            .unwrap();
        assert_eq!(body["results"], json!([5]));
        assert!(body["next"].is_null());
    }

    #[tokio::test]
    async fn test_mock_search_and_failures() {
        let source = MockListSource::new().with_items(
            "items",
            vec![json!({"name": "Ann"}), json!({"name": "Bob"})],
        );
        source.fail_next(FetchError::transport("down"));

        assert!(source.fetch_list("items", &params(1, SortOrder::Ascending, "ann")).await.is_err());

        let body = source
            .fetch_list("items", &params(1, SortOrder::Ascending, "ann"))
            .await
            .unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(source.call_count(), 2);
        assert_eq!(source.requests().len(), 2);
    }
}
