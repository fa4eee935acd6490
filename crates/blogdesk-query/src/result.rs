//! List envelopes and the observable fetch state

use crate::error::FetchError;
use crate::pagination::PageMarkers;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// A navigation marker as list endpoints send it: a URL or a flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Marker {
    /// Link to the neighbouring page
    Url(String),
    /// Bare presence flag
    Flag(bool),
}

impl Marker {
    /// Whether the marker announces a neighbouring page
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Url(url) => !url.is_empty(),
            Self::Flag(flag) => *flag,
        }
    }
}

/// One page of a list resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult<T> {
    /// Total matching items across all pages
    pub count: u64,
    /// Marker for the following page
    pub next: Option<Marker>,
    /// Marker for the preceding page
    pub previous: Option<Marker>,
    /// Items on this page
    pub results: Vec<T>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireList<T> {
    Page {
        count: u64,
        #[serde(default)]
        next: Option<Marker>,
        #[serde(default)]
        previous: Option<Marker>,
        results: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<'de, T> Deserialize<'de> for ListResult<T>
where
    T: Deserialize<'de>,
{
    /// Accepts the paged envelope or a bare array (a single complete page)
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match WireList::deserialize(deserializer)? {
            WireList::Page {
                count,
                next,
                previous,
                results,
            } => Self {
                count,
                next,
                previous,
                results,
            },
            WireList::Bare(results) => Self::complete(results),
        })
    }
}

impl<T> ListResult<T> {
    /// A single page holding every item
    #[must_use]
    pub fn complete(results: Vec<T>) -> Self {
        Self {
            count: results.len() as u64,
            next: None,
            previous: None,
            results,
        }
    }

    /// Navigation markers for pagination controls
    #[must_use]
    pub fn markers(&self) -> PageMarkers {
        PageMarkers {
            next: self.next.as_ref().is_some_and(Marker::is_present),
            previous: self.previous.as_ref().is_some_and(Marker::is_present),
        }
    }

    /// Number of items on this page
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether this page is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// What a list view shows for its current key
#[derive(Debug)]
pub enum FetchState<T> {
    /// Request issued, nothing to show yet
    Pending,
    /// The request failed after retries
    Error(FetchError),
    /// Data for the current key
    Success(Arc<ListResult<T>>),
}

impl<T> FetchState<T> {
    /// Whether the view is waiting on the server
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The page, when one is available
    #[must_use]
    pub const fn data(&self) -> Option<&Arc<ListResult<T>>> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// The failure, when the view is in the error state
    #[must_use]
    pub const fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Error(err) => Self::Error(err.clone()),
            Self::Success(data) => Self::Success(Arc::clone(data)),
        }
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::Pending
    }
}
