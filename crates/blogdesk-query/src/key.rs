//! Structured cache identity for list reads
//!
//! A [`ListQueryKey`] is the full identity of one list request. Two keys are
//! the same request exactly when they compare equal, so the cache, the
//! in-flight table and the last-key-wins guard all key on it directly.
//!
//! A [`QueryPrefix`] names a family of keys (a resource, optionally narrowed
//! by scope segments) and is what invalidation operates on.

use crate::error::{FetchError, FetchResult};
use crate::pagination::PageKey;
use blogdesk_core::utils::format_calendar_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Inclusive calendar-date filter
///
/// An end without a start cannot be expressed, and an end before the start
/// is rejected when the range is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "DateSpan")]
pub struct DateRange {
    from: NaiveDate,
    to: Option<NaiveDate>,
}

/// Unchecked wire form of [`DateRange`]
#[derive(Deserialize)]
struct DateSpan {
    from: NaiveDate,
    to: Option<NaiveDate>,
}

impl TryFrom<DateSpan> for DateRange {
    type Error = FetchError;

    fn try_from(span: DateSpan) -> FetchResult<Self> {
        match span.to {
            Some(to) => Self::between(span.from, to),
            None => Ok(Self::on(span.from)),
        }
    }
}

impl DateRange {
    /// A single day
    #[must_use]
    pub const fn on(day: NaiveDate) -> Self {
        Self { from: day, to: None }
    }

    /// An explicit span
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidQuery`] if `to` is before `from`.
    pub fn between(from: NaiveDate, to: NaiveDate) -> FetchResult<Self> {
        if to < from {
            return Err(FetchError::InvalidQuery {
                field: "end_date".to_string(),
                message: format!(
                    "{} is before the start date {}",
                    format_calendar_date(to),
                    format_calendar_date(from)
                ),
            });
        }
        Ok(Self { from, to: Some(to) })
    }

    /// First day included
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.from
    }

    /// Last day included
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.to.unwrap_or(self.from)
    }

    /// `start_date` wire value
    #[must_use]
    pub fn start_param(&self) -> String {
        format_calendar_date(self.from)
    }

    /// `end_date` wire value
    #[must_use]
    pub fn end_param(&self) -> String {
        format_calendar_date(self.end())
    }
}

/// One `name=value` narrowing of a resource, e.g. `user_id=42`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeSegment {
    /// Query parameter name
    pub name: String,
    /// Query parameter value
    pub value: String,
}

impl ScopeSegment {
    /// Create a scope segment
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ScopeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

impl FromStr for ScopeSegment {
    type Err = blogdesk_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.is_empty() && !value.is_empty() => {
                Ok(Self::new(name, value))
            }
            _ => Err(blogdesk_core::Error::validation(
                "scope",
                format!("expected name=value, got {s:?}"),
            )),
        }
    }
}

/// Full identity of one list request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListQueryKey {
    resource: String,
    scope: Vec<ScopeSegment>,
    page: PageKey,
    search: String,
    date_range: Option<DateRange>,
    filters: BTreeMap<String, Vec<String>>,
}

impl ListQueryKey {
    /// Key for `resource` at the given page with no search, dates or filters
    pub fn new(resource: impl Into<String>, page: PageKey) -> Self {
        Self {
            resource: resource.into(),
            scope: Vec::new(),
            page,
            search: String::new(),
            date_range: None,
            filters: BTreeMap::new(),
        }
    }

    /// Narrow the key with a scope segment
    #[must_use]
    pub fn with_scope(mut self, segment: ScopeSegment) -> Self {
        self.scope.push(segment);
        self
    }

    /// Set the (already debounced) search term
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Set the date range
    #[must_use]
    pub const fn with_date_range(mut self, range: Option<DateRange>) -> Self {
        self.date_range = range;
        self
    }

    /// Add a multi-value filter; an empty selection is not part of the key
    #[must_use]
    pub fn with_filter<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.filters.insert(name.into(), values);
        }
        self
    }

    /// Resource name
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Scope segments in order
    #[must_use]
    pub fn scope(&self) -> &[ScopeSegment] {
        &self.scope
    }

    /// Page address
    #[must_use]
    pub const fn page(&self) -> PageKey {
        self.page
    }

    /// Debounced search term, possibly empty
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Date range, if any
    #[must_use]
    pub const fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    /// Non-empty filters by name
    #[must_use]
    pub const fn filters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.filters
    }

    /// Prefix covering every page of this resource and scope
    #[must_use]
    pub fn prefix(&self) -> QueryPrefix {
        QueryPrefix {
            resource: self.resource.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl fmt::Display for ListQueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} page={} limit={} order={}",
            self.prefix(),
            self.page.page,
            self.page.limit,
            self.page.order
        )?;
        if !self.search.is_empty() {
            write!(f, " search={:?}", self.search)?;
        }
        if let Some(range) = self.date_range {
            write!(f, " dates={}..{}", range.start_param(), range.end_param())?;
        }
        for (name, values) in &self.filters {
            write!(f, " {name}={}", values.join(","))?;
        }
        Ok(())
    }
}

/// A family of list keys: one resource, optionally narrowed by scope
///
/// Written as `resource` or `resource/name=value/...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryPrefix {
    resource: String,
    scope: Vec<ScopeSegment>,
}

impl QueryPrefix {
    /// Prefix covering every key of `resource`
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            scope: Vec::new(),
        }
    }

    /// Narrow to keys carrying this scope segment at the next position
    #[must_use]
    pub fn scoped(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.scope.push(ScopeSegment::new(name, value));
        self
    }

    /// Resource name
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Scope segments in order
    #[must_use]
    pub fn scope(&self) -> &[ScopeSegment] {
        &self.scope
    }

    /// Whether `key` belongs to this family
    #[must_use]
    pub fn matches(&self, key: &ListQueryKey) -> bool {
        self.resource == key.resource && key.scope.starts_with(&self.scope)
    }

    /// Whether this prefix covers every key `other` covers
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self.resource == other.resource && other.scope.starts_with(&self.scope)
    }
}

impl fmt::Display for QueryPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        for segment in &self.scope {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for QueryPrefix {
    type Err = blogdesk_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let resource = parts.next().unwrap_or_default().trim();
        if resource.is_empty() {
            return Err(blogdesk_core::Error::validation(
                "prefix",
                "resource name must not be empty",
            ));
        }

        let scope = parts
            .map(str::parse)
            .collect::<Result<Vec<ScopeSegment>, _>>()?;

        Ok(Self {
            resource: resource.to_string(),
            scope,
        })
    }
}
