//! List-view controller: the parameters that identify what a view shows
//!
//! The controller owns pagination, search, date range, filters and scope for
//! one list view and derives the [`ListQueryKey`] from them. It never talks to
//! the network; [`ListView`](crate::view::ListView) does that with the key.

use crate::debounce::Debounce;
use crate::key::{DateRange, ListQueryKey, ScopeSegment};
use crate::pagination::{PageControls, PageMarkers, PaginationState, Reconciled};
use crate::result::ListResult;
use blogdesk_core::{QueryConfig, SortOrder};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Parameters of one paginated, filtered, searchable list view
#[derive(Debug, Clone)]
pub struct ListController {
    resource: String,
    scope: Vec<ScopeSegment>,
    pagination: PaginationState,
    search: Debounce<String>,
    date_range: Option<DateRange>,
    filters: BTreeMap<String, Vec<String>>,
    markers: PageMarkers,
}

impl ListController {
    /// Controller for `resource` starting on page 1
    pub fn new(resource: impl Into<String>, limit: u32, order: SortOrder, debounce: Duration) -> Self {
        Self {
            resource: resource.into(),
            scope: Vec::new(),
            pagination: PaginationState::new(limit, order),
            search: Debounce::new(String::new(), debounce),
            date_range: None,
            filters: BTreeMap::new(),
            markers: PageMarkers::default(),
        }
    }

    /// Controller using the configured page size, order and debounce window
    pub fn from_config(resource: impl Into<String>, config: &QueryConfig) -> Self {
        Self::new(
            resource,
            config.default_limit,
            config.default_order,
            config.search_debounce(),
        )
    }

    /// Narrow the view with a scope segment, replacing one of the same name
    #[must_use]
    pub fn with_scope(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_scope(name, value);
        self
    }

    /// Resource name
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Pagination state
    #[must_use]
    pub const fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    /// The key for what the view should show right now
    ///
    /// Uses the debounced search term, never the raw input.
    #[must_use]
    pub fn current_key(&self) -> ListQueryKey {
        let mut key = ListQueryKey::new(self.resource.clone(), self.pagination.key())
            .with_search(self.search.settled().clone())
            .with_date_range(self.date_range);
        for segment in &self.scope {
            key = key.with_scope(segment.clone());
        }
        for (name, values) in &self.filters {
            key = key.with_filter(name.clone(), values.iter().cloned());
        }
        key
    }

    /// Move to `page`; out-of-range pages are clamped when the result arrives
    pub fn set_page(&mut self, page: u32) {
        self.pagination.set_page(page);
    }

    /// Change the page size and go back to page 1
    pub fn set_limit(&mut self, limit: u32) {
        self.pagination.set_limit(limit);
    }

    /// Change the sort direction and go back to page 1
    pub fn set_order(&mut self, order: SortOrder) {
        self.pagination.set_order(order);
    }

    /// Flip the sort direction and go back to page 1
    pub fn toggle_order(&mut self) {
        self.pagination.toggle_order();
    }

    /// Go to page 1
    pub fn first_page(&mut self) {
        self.pagination.first_page();
    }

    /// Step back one page
    pub fn previous_page(&mut self) {
        self.pagination.previous_page();
    }

    /// Step forward one page
    pub fn next_page(&mut self) {
        self.pagination.next_page();
    }

    /// Jump to the last known page
    pub fn last_page(&mut self) {
        self.pagination.last_page();
    }

    /// Record raw search input at `now`; the key changes once it settles
    pub fn set_search_term(&mut self, term: impl Into<String>, now: Instant) {
        self.search.input(term.into(), now);
    }

    /// Settle the search term if its quiet window has passed
    ///
    /// Returns whether the key's search term changed.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        let changed = self.search.poll(now);
        if changed {
            debug!(resource = %self.resource, term = %self.search.settled(), "Search term settled");
        }
        changed
    }

    /// Settle pending search input now, e.g. on Enter
    pub fn flush_search(&mut self) -> bool {
        self.search.flush()
    }

    /// Drop pending search input, e.g. when the view unmounts
    pub fn cancel_search(&mut self) {
        self.search.cancel();
    }

    /// What the user has typed, settled or not
    #[must_use]
    pub fn search_input(&self) -> &str {
        self.search.latest()
    }

    /// Search term in effect
    #[must_use]
    pub fn search_term(&self) -> &str {
        self.search.settled()
    }

    /// When pending search input will settle
    #[must_use]
    pub fn search_deadline(&self) -> Option<Instant> {
        self.search.deadline()
    }

    /// Filter by calendar dates; `None` clears the filter
    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.date_range = range;
    }

    /// Current date range
    #[must_use]
    pub const fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    /// Replace the selected values of filter `name`; empty clears it
    pub fn set_filter<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.filters.remove(&name);
        } else {
            self.filters.insert(name, values);
        }
    }

    /// Select `value` in filter `name`, or deselect it if already selected
    pub fn toggle_filter_value(&mut self, name: &str, value: &str) {
        let values = self.filters.entry(name.to_string()).or_default();
        if let Some(position) = values.iter().position(|v| v == value) {
            values.remove(position);
        } else {
            values.push(value.to_string());
        }
        if values.is_empty() {
            self.filters.remove(name);
        }
    }

    /// Selected values of filter `name`
    #[must_use]
    pub fn filter(&self, name: &str) -> &[String] {
        self.filters.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Clear every filter and the date range
    pub fn reset_filters(&mut self) {
        self.filters.clear();
        self.date_range = None;
    }

    /// Total selected filter values, the badge on the filter button
    #[must_use]
    pub fn active_filter_count(&self) -> usize {
        self.filters.values().map(Vec::len).sum()
    }

    /// Set scope segment `name`, keeping its position if already present
    pub fn set_scope(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let segment = ScopeSegment::new(name, value);
        match self.scope.iter_mut().find(|s| s.name == segment.name) {
            Some(existing) => *existing = segment,
            None => self.scope.push(segment),
        }
    }

    /// Recompute the page count from `server_count` and clamp the page
    pub fn reconcile(&mut self, server_count: u64) -> Reconciled {
        let outcome = self.pagination.reconcile(server_count);
        if outcome.clamped() {
            debug!(
                resource = %self.resource,
                from = outcome.from_page,
                to = outcome.to_page,
                total = outcome.total_pages,
                "Page out of range, clamped"
            );
        }
        outcome
    }

    /// Take a page's count and markers into account
    pub fn observe<T>(&mut self, page: &ListResult<T>) -> Reconciled {
        self.markers = page.markers();
        self.reconcile(page.count)
    }

    /// Which navigation controls are enabled
    #[must_use]
    pub const fn page_controls(&self) -> PageControls {
        self.pagination.controls(self.markers)
    }

    /// Whether a following page exists
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.pagination.has_next(self.markers)
    }

    /// Whether a preceding page exists
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.pagination.has_previous(self.markers)
    }

    /// `Page N of T`
    #[must_use]
    pub fn page_label(&self) -> String {
        self.pagination.label()
    }
}
