//! Cache keys and key patterns.

use crate::core::query::QueryParams;
use std::fmt;

/// Backend entity collections the client reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Sales invoices
    Invoices,
    /// Credit notes issued against invoices
    CreditNotes,
    /// Product catalogue with stock levels
    Products,
    /// Per-product stock movement history
    StockLedger,
    /// Customers and suppliers
    Parties,
    /// GST summary report
    GstReport,
    /// Sales report
    SalesReport,
    /// Dashboard totals
    Dashboard,
    /// Current subscription plan
    Subscription,
    /// Audit trail
    AuditLogs,
}

impl Resource {
    /// Every resource, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Invoices,
        Self::CreditNotes,
        Self::Products,
        Self::StockLedger,
        Self::Parties,
        Self::GstReport,
        Self::SalesReport,
        Self::Dashboard,
        Self::Subscription,
        Self::AuditLogs,
    ];

    /// Stable name used in logs and key rendering.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invoices => "invoices",
            Self::CreditNotes => "credit-notes",
            Self::Products => "products",
            Self::StockLedger => "stock-ledger",
            Self::Parties => "parties",
            Self::GstReport => "gst-report",
            Self::SalesReport => "sales-report",
            Self::Dashboard => "dashboard",
            Self::Subscription => "subscription",
            Self::AuditLogs => "audit-logs",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Composite address of a cached snapshot.
///
/// Filters are the serialized request parameters in the order the filter type
/// defines, so two keys are equal exactly when they would produce the same
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Resource,
    subject: Option<String>,
    filters: Vec<(String, String)>,
}

impl QueryKey {
    /// List-level key for `resource` filtered by `params`.
    #[must_use]
    pub fn list(resource: Resource, params: &QueryParams) -> Self {
        Self {
            resource,
            subject: None,
            filters: collect_filters(params),
        }
    }

    /// Detail key for a single record.
    #[must_use]
    pub fn detail(resource: Resource, id: impl Into<String>) -> Self {
        Self {
            resource,
            subject: Some(id.into()),
            filters: Vec::new(),
        }
    }

    /// Key for a filtered collection that belongs to one record,
    /// e.g. the stock ledger of a product.
    #[must_use]
    pub fn owned(resource: Resource, id: impl Into<String>, params: &QueryParams) -> Self {
        Self {
            resource,
            subject: Some(id.into()),
            filters: collect_filters(params),
        }
    }

    /// Key for a resource with a single unfiltered snapshot.
    #[must_use]
    pub const fn singleton(resource: Resource) -> Self {
        Self {
            resource,
            subject: None,
            filters: Vec::new(),
        }
    }

    /// Resource component.
    #[must_use]
    pub const fn resource(&self) -> Resource {
        self.resource
    }

    /// Record id component, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Filter values in key order.
    #[must_use]
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }
}

fn collect_filters(params: &QueryParams) -> Vec<(String, String)> {
    params
        .present()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        if let Some(id) = &self.subject {
            write!(f, "/{id}")?;
        }
        for (i, (name, value)) in self.filters.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

/// Which record ids a pattern covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdMatch {
    /// Every key of the resource
    Any,
    /// Only keys without a record id (list-level)
    ListOnly,
    /// Only keys for this record id
    Exactly(String),
}

/// Selects cache keys by resource and record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    /// Resource component to match
    pub resource: Resource,
    /// Record id rule
    pub id: IdMatch,
}

impl KeyPattern {
    /// All keys of `resource`.
    #[must_use]
    pub const fn all(resource: Resource) -> Self {
        Self {
            resource,
            id: IdMatch::Any,
        }
    }

    /// List-level keys of `resource`.
    #[must_use]
    pub const fn lists(resource: Resource) -> Self {
        Self {
            resource,
            id: IdMatch::ListOnly,
        }
    }

    /// Keys of `resource` for record `id`.
    #[must_use]
    pub fn record(resource: Resource, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: IdMatch::Exactly(id.into()),
        }
    }

    /// Whether `key` falls under this pattern.
    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        if key.resource != self.resource {
            return false;
        }
        match &self.id {
            IdMatch::Any => true,
            IdMatch::ListOnly => key.subject.is_none(),
            IdMatch::Exactly(id) => key.subject.as_deref() == Some(id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_serialized_filters() {
        let a = QueryParams::new()
            .with("page", 1)
            .with("status", "")
            .with("pageSize", 20);
        let b = QueryParams::new().with("page", 1).with("pageSize", 20);
        assert_eq!(
            QueryKey::list(Resource::Invoices, &a),
            QueryKey::list(Resource::Invoices, &b)
        );

        let c = QueryParams::new().with("page", 2).with("pageSize", 20);
        assert_ne!(
            QueryKey::list(Resource::Invoices, &a),
            QueryKey::list(Resource::Invoices, &c)
        );
    }

    #[test]
    fn test_display() {
        let params = QueryParams::new().with("page", 1).with("pageSize", 10);
        assert_eq!(
            QueryKey::owned(Resource::StockLedger, "p1", &params).to_string(),
            "stock-ledger/p1?page=1&pageSize=10"
        );
        assert_eq!(QueryKey::singleton(Resource::Dashboard).to_string(), "dashboard");
    }

    #[test]
    fn test_pattern_matching() {
        let list = QueryKey::list(Resource::Products, &QueryParams::new().with("page", 1));
        let detail = QueryKey::detail(Resource::Products, "p1");
        let other = QueryKey::detail(Resource::Products, "p2");
        let ledger = QueryKey::owned(Resource::StockLedger, "p1", &QueryParams::new());

        assert!(KeyPattern::all(Resource::Products).matches(&list));
        assert!(KeyPattern::all(Resource::Products).matches(&detail));
        assert!(!KeyPattern::all(Resource::Products).matches(&ledger));

        assert!(KeyPattern::lists(Resource::Products).matches(&list));
        assert!(!KeyPattern::lists(Resource::Products).matches(&detail));

        assert!(KeyPattern::record(Resource::Products, "p1").matches(&detail));
        assert!(!KeyPattern::record(Resource::Products, "p1").matches(&other));
        assert!(KeyPattern::record(Resource::StockLedger, "p1").matches(&ledger));
    }
}
