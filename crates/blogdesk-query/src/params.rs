//! Query-string serialization of a list key

use crate::error::{FetchError, FetchResult};
use crate::key::ListQueryKey;
use serde::Serialize;

/// Ordered query parameters for one list request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ListParams {
    pairs: Vec<(String, String)>,
}

impl ListParams {
    /// Build the parameters a list endpoint expects for `key`
    ///
    /// Scope segments come first, then `offset`, `limit` and `order`.
    /// `search` is sent only when non-empty. A date range becomes
    /// `start_date`/`end_date` in `YYYY-MM-DD`, and each filter is sent as a
    /// single comma-joined value.
    #[must_use]
    pub fn from_key(key: &ListQueryKey) -> Self {
        let mut params = Self::default();

        for segment in key.scope() {
            params.push(&segment.name, segment.value.clone());
        }

        let page = key.page();
        params.push("offset", page.offset().to_string());
        params.push("limit", page.limit.to_string());
        params.push("order", page.order.as_param().to_string());

        if !key.search().is_empty() {
            params.push("search", key.search().to_string());
        }

        if let Some(range) = key.date_range() {
            params.push("start_date", range.start_param());
            params.push("end_date", range.end_param());
        }

        for (name, values) in key.filters() {
            if !values.is_empty() {
                params.push(name, values.join(","));
            }
        }

        params
    }

    fn push(&mut self, name: &str, value: String) {
        self.pairs.push((name.to_string(), value));
    }

    /// Parameters in wire order
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// First value for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// URL-encoded query string without the leading `?`
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidQuery`] if the pairs cannot be encoded.
    pub fn encode(&self) -> FetchResult<String> {
        serde_urlencoded::to_string(&self.pairs).map_err(|e| FetchError::InvalidQuery {
            field: "query".to_string(),
            message: e.to_string(),
        })
    }
}

impl FromIterator<(String, String)> for ListParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}
