//! Page cursor for a single list view

use blogdesk_core::SortOrder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The page-addressing part of a list query key
///
/// Holds no total: that is derived from server data and never changes the
/// identity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageKey {
    /// Page number (1-based)
    pub page: u32,
    /// Items per page
    pub limit: u32,
    /// Sort direction
    pub order: SortOrder,
}

impl PageKey {
    /// Zero-based index of the first item on the page
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Pagination state owned by one list view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    page: u32,
    order: SortOrder,
    limit: u32,
    total: u32,
}

/// Navigation markers reported by the server alongside a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMarkers {
    /// Server reported a following page
    pub next: bool,
    /// Server reported a preceding page
    pub previous: bool,
}

/// Enablement of the four navigation controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageControls {
    /// Jump to page 1
    pub first: bool,
    /// Step back one page
    pub previous: bool,
    /// Step forward one page
    pub next: bool,
    /// Jump to the last known page
    pub last: bool,
}

/// Outcome of reconciling the page cursor against a server count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// Page before reconciliation
    pub from_page: u32,
    /// Page after reconciliation
    pub to_page: u32,
    /// Derived page count
    pub total_pages: u32,
}

impl Reconciled {
    /// Whether the page had to be moved
    #[must_use]
    pub const fn clamped(&self) -> bool {
        self.from_page != self.to_page
    }
}

impl PaginationState {
    /// Start on page 1 with no known total
    ///
    /// A zero limit is raised to 1 so the offset arithmetic stays defined.
    #[must_use]
    pub fn new(limit: u32, order: SortOrder) -> Self {
        Self {
            page: 1,
            order,
            limit: limit.max(1),
            total: 0,
        }
    }

    /// Current page (1-based)
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Sort direction
    #[must_use]
    pub const fn order(&self) -> SortOrder {
        self.order
    }

    /// Page count derived from the last reconciled server count
    #[must_use]
    pub const fn total_pages(&self) -> u32 {
        self.total
    }

    /// Zero-based offset of the current page
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.key().offset()
    }

    /// The part of the query key this state contributes
    #[must_use]
    pub const fn key(&self) -> PageKey {
        PageKey {
            page: self.page,
            limit: self.limit,
            order: self.order,
        }
    }

    /// Move to `page`
    ///
    /// Not validated against the total; an out-of-range page is corrected by
    /// [`reconcile`](Self::reconcile) when the server answers.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Change the page size and go back to page 1
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit.max(1);
        self.page = 1;
    }

    /// Change the sort direction and go back to page 1
    pub fn set_order(&mut self, order: SortOrder) {
        if self.order != order {
            self.order = order;
            self.page = 1;
        }
    }

    /// Flip the sort direction
    pub fn toggle_order(&mut self) {
        self.set_order(self.order.reversed());
    }

    /// Go to page 1
    pub fn first_page(&mut self) {
        self.page = 1;
    }

    /// Step back one page, stopping at 1
    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Step forward one page
    pub fn next_page(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    /// Jump to the last known page; no-op while the total is unknown
    pub fn last_page(&mut self) {
        if self.total > 0 {
            self.page = self.total;
        }
    }

    /// Recompute the total from `server_count` and clamp the page into range
    ///
    /// Idempotent: a second call with the same count changes nothing.
    pub fn reconcile(&mut self, server_count: u64) -> Reconciled {
        let from_page = self.page;
        self.total = total_pages(server_count, self.limit);

        if self.total == 0 {
            self.page = 1;
        } else if self.page > self.total {
            self.page = self.total;
        }

        Reconciled {
            from_page,
            to_page: self.page,
            total_pages: self.total,
        }
    }

    /// Whether a following page exists
    ///
    /// Trusts the server's marker first, then the count-derived total.
    #[must_use]
    pub const fn has_next(&self, markers: PageMarkers) -> bool {
        markers.next || self.page < self.total
    }

    /// Whether a preceding page exists
    #[must_use]
    pub const fn has_previous(&self, markers: PageMarkers) -> bool {
        markers.previous || self.page > 1
    }

    /// Which navigation controls are enabled
    #[must_use]
    pub const fn controls(&self, markers: PageMarkers) -> PageControls {
        let not_first = self.page > 1;
        PageControls {
            first: not_first,
            previous: not_first,
            next: self.has_next(markers),
            last: self.total > 0 && self.page < self.total,
        }
    }

    /// Human-readable position, `Page 2 of 3`
    #[must_use]
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(10, SortOrder::default())
    }
}

impl fmt::Display for PaginationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            write!(f, "Page {} of \u{2014}", self.page)
        } else {
            write!(f, "Page {} of {}", self.page, self.total)
        }
    }
}

/// `ceil(count / limit)`, saturating at `u32::MAX`
#[must_use]
pub fn total_pages(count: u64, limit: u32) -> u32 {
    let limit = u64::from(limit.max(1));
    u32::try_from(count.div_ceil(limit)).unwrap_or(u32::MAX)
}
