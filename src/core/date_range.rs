//! Reporting window selection.
//!
//! A [`DateRange`] holds the raw start and end strings the user picked and
//! re-validates after every change. Report queries read the dates through
//! [`DateRange::valid_start`] / [`DateRange::valid_end`], which stay empty
//! until the range is usable, so no request goes out for a half-entered or
//! invalid window. Once valid, both are normalized to `YYYY-MM-DD` whatever
//! form the user typed.

use crate::core::format::{parse_iso_date, to_iso_date};
use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

/// Default upper bound on the span of a range, in whole months.
pub const DEFAULT_MAX_MONTHS: u32 = 12;

/// Why a fully entered range is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateRangeError {
    /// Start falls after end
    #[error("Start date must be before end date")]
    StartAfterEnd,
    /// Span exceeds the configured maximum
    #[error("Maximum date range is {max_months} months.")]
    SpanTooLong {
        /// Configured maximum
        max_months: u32,
    },
}

/// Number of whole months from `start` to `end`.
///
/// A month only counts once `end` reaches the same day-of-month as `start`.
#[must_use]
pub fn whole_months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let mut months = i64::from(end.year() - start.year()) * 12
        + i64::from(end.month()) - i64::from(start.month());
    if months > 0 && end.day() < start.day() {
        months -= 1;
    } else if months < 0 && end.day() > start.day() {
        months += 1;
    }
    months
}

/// User-selected reporting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: String,
    end: String,
    max_months: u32,
    error: Option<DateRangeError>,
    window: Option<Window>,
}

/// Parsed endpoints of a valid range with their canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    start: NaiveDate,
    end: NaiveDate,
    start_iso: String,
    end_iso: String,
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MONTHS)
    }
}

impl DateRange {
    /// Empty range with the given span limit.
    #[must_use]
    pub const fn new(max_months: u32) -> Self {
        Self {
            start: String::new(),
            end: String::new(),
            max_months,
            error: None,
            window: None,
        }
    }

    /// Range pre-filled with both endpoints.
    #[must_use]
    pub fn with_dates(start: impl Into<String>, end: impl Into<String>, max_months: u32) -> Self {
        let mut range = Self::new(max_months);
        range.set_range(start, end);
        range
    }

    /// From the first of `today`'s month up to `today`.
    #[must_use]
    pub fn current_month(today: NaiveDate, max_months: u32) -> Self {
        let first = today.with_day(1).unwrap_or(today);
        Self::with_dates(to_iso_date(first), to_iso_date(today), max_months)
    }

    /// The `days` days ending on `today`, inclusive.
    #[must_use]
    pub fn last_n_days(today: NaiveDate, days: u32, max_months: u32) -> Self {
        let back = i64::from(days.saturating_sub(1));
        let start = today
            .checked_sub_signed(Duration::days(back))
            .unwrap_or(today);
        Self::with_dates(to_iso_date(start), to_iso_date(today), max_months)
    }

    /// Sets the start date and re-validates.
    pub fn set_start(&mut self, start: impl Into<String>) {
        self.start = start.into();
        self.revalidate();
    }

    /// Sets the end date and re-validates.
    pub fn set_end(&mut self, end: impl Into<String>) {
        self.end = end.into();
        self.revalidate();
    }

    /// Sets both endpoints and re-validates once.
    pub fn set_range(&mut self, start: impl Into<String>, end: impl Into<String>) {
        self.start = start.into();
        self.end = end.into();
        self.revalidate();
    }

    /// Changes the span limit and re-validates.
    pub fn set_max_months(&mut self, max_months: u32) {
        self.max_months = max_months;
        self.revalidate();
    }

    /// Raw start string as entered.
    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Raw end string as entered.
    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// Configured span limit.
    #[must_use]
    pub const fn max_months(&self) -> u32 {
        self.max_months
    }

    /// Current validation error.
    #[must_use]
    pub const fn error(&self) -> Option<DateRangeError> {
        self.error
    }

    /// Both dates present and parseable, and no error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid_dates().is_some()
    }

    /// Parsed endpoints when the range is valid.
    #[must_use]
    pub fn valid_dates(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.window.as_ref().map(|w| (w.start, w.end))
    }

    /// Start date as `YYYY-MM-DD` when valid, otherwise `""`.
    #[must_use]
    pub fn valid_start(&self) -> &str {
        self.window.as_ref().map_or("", |w| w.start_iso.as_str())
    }

    /// End date as `YYYY-MM-DD` when valid, otherwise `""`.
    #[must_use]
    pub fn valid_end(&self) -> &str {
        self.window.as_ref().map_or("", |w| w.end_iso.as_str())
    }

    fn revalidate(&mut self) {
        self.window = None;
        self.error = None;
        let (Some(start), Some(end)) = (parse_iso_date(&self.start), parse_iso_date(&self.end))
        else {
            return;
        };

        self.error = validate(start, end, self.max_months);
        if self.error.is_none() {
            self.window = Some(Window {
                start,
                end,
                start_iso: to_iso_date(start),
                end_iso: to_iso_date(end),
            });
        }
    }
}

/// Applies the range rules in order to two parsed dates.
fn validate(start: NaiveDate, end: NaiveDate, max_months: u32) -> Option<DateRangeError> {
    if start > end {
        return Some(DateRangeError::StartAfterEnd);
    }

    if whole_months_between(start, end) > i64::from(max_months) {
        return Some(DateRangeError::SpanTooLong { max_months });
    }

    None
}
