//! Utility functions for the blogdesk dashboard

use crate::Result;
use chrono::NaiveDate;

/// Wire format of every date-only query parameter
pub const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a calendar day as `YYYY-MM-DD`
#[must_use]
pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format(CALENDAR_DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` calendar day
///
/// # Errors
///
/// Returns a validation error if the input is not a valid calendar day.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), CALENDAR_DATE_FORMAT).map_err(|e| {
        crate::Error::validation("date", format!("{input:?} is not a YYYY-MM-DD date: {e}"))
    })
}
