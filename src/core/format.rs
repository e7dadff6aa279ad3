//! Display formatting for amounts, dates and rates.
//!
//! Amounts arrive from the backend as numbers or numeric strings; anything that
//! does not parse to a finite number renders as the zero amount instead of
//! failing. Grouping follows the Indian convention (`12,34,567.50`).

use chrono::{DateTime, NaiveDate};

/// Currency symbol prefixed to every formatted amount.
pub const CURRENCY_SYMBOL: &str = "₹";

/// Rendered for amounts that cannot be interpreted.
pub const ZERO_AMOUNT: &str = "₹0.00";

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_DATE_FORMAT: &str = "%d %b %Y";

/// Anything that may carry a monetary amount.
pub trait ToAmount {
    /// The amount as a finite number, or `None` if it is missing or not numeric.
    fn to_amount(&self) -> Option<f64>;
}

impl ToAmount for f64 {
    fn to_amount(&self) -> Option<f64> {
        self.is_finite().then_some(*self)
    }
}

impl ToAmount for f32 {
    fn to_amount(&self) -> Option<f64> {
        f64::from(*self).to_amount()
    }
}

impl ToAmount for i64 {
    #[allow(clippy::cast_precision_loss)]
    fn to_amount(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl ToAmount for i32 {
    fn to_amount(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl ToAmount for u32 {
    fn to_amount(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl ToAmount for str {
    fn to_amount(&self) -> Option<f64> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<f64>().ok().and_then(|n| n.to_amount())
    }
}

impl ToAmount for String {
    fn to_amount(&self) -> Option<f64> {
        self.as_str().to_amount()
    }
}

impl<T: ToAmount> ToAmount for Option<T> {
    fn to_amount(&self) -> Option<f64> {
        self.as_ref().and_then(ToAmount::to_amount)
    }
}

impl ToAmount for serde_json::Value {
    fn to_amount(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64().and_then(|n| n.to_amount()),
            Self::String(s) => s.to_amount(),
            _ => None,
        }
    }
}

impl<T: ToAmount + ?Sized> ToAmount for &T {
    fn to_amount(&self) -> Option<f64> {
        (**self).to_amount()
    }
}

/// Inserts Indian-style separators into a string of ASCII digits.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

/// Formats `amount` with grouping and a fixed number of decimals. Returns
/// the sign separately so callers can place it before a symbol.
fn grouped(amount: f64, decimals: usize) -> (bool, String) {
    let fixed = format!("{:.*}", decimals, amount.abs());
    let negative = amount < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let body = match fixed.split_once('.') {
        Some((int_part, frac)) => format!("{}.{frac}", group_indian(int_part)),
        None => group_indian(&fixed),
    };
    (negative, body)
}

/// Formats a rupee amount, e.g. `"1234.5"` → `"₹1,234.50"`.
///
/// Non-numeric, empty or missing input yields [`ZERO_AMOUNT`].
#[must_use]
pub fn format_currency<T: ToAmount + ?Sized>(value: &T) -> String {
    let Some(amount) = value.to_amount() else {
        return ZERO_AMOUNT.to_string();
    };
    let (negative, body) = grouped(amount, 2);
    if negative {
        format!("-{CURRENCY_SYMBOL}{body}")
    } else {
        format!("{CURRENCY_SYMBOL}{body}")
    }
}

/// Formats a plain quantity with grouping, e.g. stock counts.
#[must_use]
pub fn format_number<T: ToAmount + ?Sized>(value: &T, decimals: usize) -> String {
    let amount = value.to_amount().unwrap_or(0.0);
    let (negative, body) = grouped(amount, decimals);
    if negative { format!("-{body}") } else { body }
}

/// Formats a tax rate, e.g. `18.0` → `"18%"`, `2.5` → `"2.5%"`.
#[must_use]
pub fn format_percent(rate: f64) -> String {
    if rate.is_finite() {
        format!("{rate}%")
    } else {
        "0%".to_string()
    }
}

/// Formats a date as `YYYY-MM-DD`.
#[must_use]
pub fn to_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// Parses a `YYYY-MM-DD` date or an RFC 3339 timestamp into its calendar day.
///
/// Malformed input returns `None`.
#[must_use]
pub fn parse_iso_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, ISO_DATE_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Formats a date for display, e.g. `"18 Oct 2026"`.
#[must_use]
pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

/// Formats a backend date string for display; unparseable input renders as `"-"`.
#[must_use]
pub fn format_display_date_str(input: &str) -> String {
    parse_iso_date(input).map_or_else(|| "-".to_string(), format_display_date)
}
