//! Wire types shared by every resource.

use crate::core::format::ToAmount;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;
use uuid::Uuid;

/// Paginated list envelope returned by every list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Records on this page
    pub data: Vec<T>,
    /// 1-based page number
    pub page: u32,
    /// Requested page size
    pub page_size: u32,
    /// Total matching records
    pub total: u64,
    /// Total number of pages
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// True when the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Pagination request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    /// Records per page
    pub page_size: u32,
}

impl Pagination {
    /// Page size used when the caller does not choose one.
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    /// Page `page` with the default size.
    #[must_use]
    pub const fn page(page: u32) -> Self {
        Self {
            page,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::page(1)
    }
}

/// Monetary amount. The backend sends decimals either as JSON numbers or as
/// numeric strings; both are accepted, anything else is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Money(pub f64);

impl Money {
    /// The amount as a float.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl ToAmount for Money {
    fn to_amount(&self) -> Option<f64> {
        self.0.to_amount()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) if n.is_finite() => Ok(Self(n)),
            Raw::Number(n) => Err(de::Error::custom(format!("non-finite amount {n}"))),
            Raw::Text(s) => s
                .to_amount()
                .map(Self)
                .ok_or_else(|| de::Error::custom(format!("invalid amount {s:?}"))),
        }
    }
}

/// Token that lets the server recognize a retried write as the same logical
/// operation. Create one per user action and reuse it for every retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// HTTP header carrying the token.
    pub const HEADER: &'static str = "Idempotency-Key";

    /// Fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing token, e.g. one restored after a crash.
    #[must_use]
    pub fn from_string(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error body returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_money_accepts_numbers_and_numeric_strings() {
        let n: Money = serde_json::from_value(json!(1234.5)).unwrap();
        let s: Money = serde_json::from_value(json!("1234.50")).unwrap();
        assert_eq!(n.value(), 1234.5);
        assert_eq!(s.value(), 1234.5);
    }

    #[test]
    fn test_money_rejects_garbage() {
        assert!(serde_json::from_value::<Money>(json!("twelve")).is_err());
        assert!(serde_json::from_value::<Money>(json!(null)).is_err());
        assert!(serde_json::from_value::<Money>(json!({"amount": 1})).is_err());
    }

    #[test]
    fn test_page_envelope() {
        let page: Page<u32> = serde_json::from_value(json!({
            "data": [1, 2, 3],
            "page": 1,
            "pageSize": 3,
            "total": 7,
            "totalPages": 3
        }))
        .unwrap();
        assert_eq!(page.data, vec![1, 2, 3]);
        assert!(page.has_next());
        assert!(!page.is_empty());
    }

    #[test]
    fn test_page_without_data_is_rejected() {
        let result = serde_json::from_value::<Page<u32>>(json!({
            "page": 1, "pageSize": 20, "total": 0, "totalPages": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_idempotency_keys_are_unique() {
        let a = IdempotencyKey::generate();
        let b = IdempotencyKey::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody = serde_json::from_value(json!({"error": "Not found"})).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Not found"));
        let body: ErrorBody = serde_json::from_value(json!({"message": " "})).unwrap();
        assert_eq!(body.into_message(), None);
    }
}
