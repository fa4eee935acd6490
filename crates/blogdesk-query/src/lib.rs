//! Paginated, filtered, searchable list views over a keyed query cache
//!
//! The pieces, bottom up:
//!
//! - [`PaginationState`]: page, limit, order and the derived page count,
//!   with clamping against the server count.
//! - [`ListQueryKey`]: the structured identity of one list request, and
//!   [`QueryPrefix`] for addressing families of keys.
//! - [`ListParams`]: the wire parameters a key serializes to.
//! - [`QueryCache`]: an injected store with per-resource staleness,
//!   invalidation and garbage collection.
//! - [`RemoteListFetcher`]: de-duplicated, retried requests through a
//!   [`ListSource`].
//! - [`ListController`] and [`ListView`]: one mounted view, applying results
//!   last-key-wins.
//! - [`InvalidationBus`]: how mutations mark cached lists stale.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod cache;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod fetcher;
pub mod invalidation;
pub mod key;
pub mod mock;
pub mod pagination;
pub mod params;
pub mod result;
pub mod view;

// Re-export commonly used types
pub use cache::{CacheHit, Freshness, QueryCache};
pub use controller::ListController;
pub use debounce::{Debounce, DebouncedInput};
pub use error::{FetchError, FetchResult};
pub use fetcher::{ListQuery, ListSource, RemoteListFetcher, RetryPolicy, Ticket};
pub use invalidation::{InvalidationBus, Invalidates};
pub use key::{DateRange, ListQueryKey, QueryPrefix, ScopeSegment};
pub use params::ListParams;
pub use pagination::{PageControls, PageKey, PageMarkers, PaginationState, Reconciled};
pub use result::{FetchState, ListResult, Marker};
pub use view::{FetchedPage, ListView, PendingFetch, Prepared, SyncOutcome};

/// Initialize logging for tests
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("blogdesk_query=debug")
            .with_test_writer()
            .try_init();
    });
}
