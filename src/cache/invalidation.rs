//! Declarative invalidation graph.
//!
//! [`INVALIDATION_TABLE`] lists, for every write the client can perform, the
//! cache keys that become stale once the write succeeds. Keeping it as data
//! makes the graph reviewable in one place and testable without a network.

use crate::cache::key::{
    KeyPattern,
    Resource::{
        self, AuditLogs, CreditNotes, Dashboard, GstReport, Invoices, Parties, Products,
        SalesReport, StockLedger, Subscription,
    },
};
use std::fmt;

/// Write operations exposed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Create a draft invoice
    CreateInvoice,
    /// Edit a draft invoice
    UpdateInvoice,
    /// Delete a draft invoice
    DeleteInvoice,
    /// Lock an invoice, assign its number and move stock
    FinalizeInvoice,
    /// Void a finalized invoice
    CancelInvoice,
    /// Record a payment against an invoice
    RecordPayment,
    /// Create a draft credit note
    CreateCreditNote,
    /// Lock a credit note and apply it
    FinalizeCreditNote,
    /// Void a credit note
    CancelCreditNote,
    /// Add a product
    CreateProduct,
    /// Edit a product
    UpdateProduct,
    /// Remove a product
    DeleteProduct,
    /// Manual stock correction
    AdjustStock,
    /// Add a party
    CreateParty,
    /// Edit a party
    UpdateParty,
    /// Remove a party
    DeleteParty,
    /// Switch subscription plan
    ChangePlan,
    /// Stop the subscription
    CancelSubscription,
}

impl Mutation {
    /// Operation name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateInvoice => "create invoice",
            Self::UpdateInvoice => "update invoice",
            Self::DeleteInvoice => "delete invoice",
            Self::FinalizeInvoice => "finalize invoice",
            Self::CancelInvoice => "cancel invoice",
            Self::RecordPayment => "record payment",
            Self::CreateCreditNote => "create credit note",
            Self::FinalizeCreditNote => "finalize credit note",
            Self::CancelCreditNote => "cancel credit note",
            Self::CreateProduct => "create product",
            Self::UpdateProduct => "update product",
            Self::DeleteProduct => "delete product",
            Self::AdjustStock => "adjust stock",
            Self::CreateParty => "create party",
            Self::UpdateParty => "update party",
            Self::DeleteParty => "delete party",
            Self::ChangePlan => "change plan",
            Self::CancelSubscription => "cancel subscription",
        }
    }

    /// Writes whose accidental duplication would create a second record or
    /// a second ledger effect. These must carry an idempotency key.
    #[must_use]
    pub const fn requires_idempotency_key(self) -> bool {
        matches!(
            self,
            Self::CreateInvoice
                | Self::FinalizeInvoice
                | Self::RecordPayment
                | Self::CreateCreditNote
                | Self::FinalizeCreditNote
        )
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Portion of a resource a target covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every key of the resource
    All,
    /// List-level keys only
    Lists,
    /// Keys for the written record's id; every key when the id is unknown
    Subject,
}

/// One edge of the invalidation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Resource whose keys go stale
    pub resource: Resource,
    /// Which of its keys
    pub scope: Scope,
}

impl Target {
    /// Resolves the target to a concrete pattern for a write on `subject`.
    #[must_use]
    pub fn pattern(&self, subject: Option<&str>) -> KeyPattern {
        match (self.scope, subject) {
            (Scope::Lists, _) => KeyPattern::lists(self.resource),
            (Scope::Subject, Some(id)) => KeyPattern::record(self.resource, id),
            (Scope::All | Scope::Subject, _) => KeyPattern::all(self.resource),
        }
    }
}

const fn all(resource: Resource) -> Target {
    Target {
        resource,
        scope: Scope::All,
    }
}

const fn lists(resource: Resource) -> Target {
    Target {
        resource,
        scope: Scope::Lists,
    }
}

const fn subject(resource: Resource) -> Target {
    Target {
        resource,
        scope: Scope::Subject,
    }
}

/// Finalizing or voiding an invoice moves stock, party balances and tax totals.
const DOCUMENT_POSTED: &[Target] = &[
    lists(Invoices),
    subject(Invoices),
    all(Products),
    all(StockLedger),
    all(Parties),
    all(GstReport),
    all(SalesReport),
    all(Dashboard),
    lists(AuditLogs),
];

const CREDIT_NOTE_POSTED: &[Target] = &[
    lists(CreditNotes),
    subject(CreditNotes),
    all(Invoices),
    all(Products),
    all(StockLedger),
    all(Parties),
    all(GstReport),
    all(SalesReport),
    all(Dashboard),
    lists(AuditLogs),
];

const SUBSCRIPTION_CHANGED: &[Target] = &[all(Subscription), lists(AuditLogs)];

/// Mutation → stale keys.
pub static INVALIDATION_TABLE: &[(Mutation, &[Target])] = &[
    (
        Mutation::CreateInvoice,
        &[lists(Invoices), all(Dashboard), lists(AuditLogs)],
    ),
    (
        Mutation::UpdateInvoice,
        &[lists(Invoices), subject(Invoices), lists(AuditLogs)],
    ),
    (
        Mutation::DeleteInvoice,
        &[
            lists(Invoices),
            subject(Invoices),
            all(Dashboard),
            lists(AuditLogs),
        ],
    ),
    (Mutation::FinalizeInvoice, DOCUMENT_POSTED),
    (Mutation::CancelInvoice, DOCUMENT_POSTED),
    (
        Mutation::RecordPayment,
        &[
            lists(Invoices),
            subject(Invoices),
            all(Parties),
            all(SalesReport),
            all(Dashboard),
            lists(AuditLogs),
        ],
    ),
    (
        Mutation::CreateCreditNote,
        &[lists(CreditNotes), all(Invoices), lists(AuditLogs)],
    ),
    (Mutation::FinalizeCreditNote, CREDIT_NOTE_POSTED),
    (Mutation::CancelCreditNote, CREDIT_NOTE_POSTED),
    (
        Mutation::CreateProduct,
        &[lists(Products), all(Dashboard), lists(AuditLogs)],
    ),
    (
        Mutation::UpdateProduct,
        &[lists(Products), subject(Products), lists(AuditLogs)],
    ),
    (
        Mutation::DeleteProduct,
        &[
            lists(Products),
            subject(Products),
            subject(StockLedger),
            all(Dashboard),
            lists(AuditLogs),
        ],
    ),
    (
        Mutation::AdjustStock,
        &[
            lists(Products),
            subject(Products),
            subject(StockLedger),
            all(Dashboard),
            lists(AuditLogs),
        ],
    ),
    (Mutation::CreateParty, &[lists(Parties), lists(AuditLogs)]),
    (
        Mutation::UpdateParty,
        &[lists(Parties), subject(Parties), lists(AuditLogs)],
    ),
    (
        Mutation::DeleteParty,
        &[lists(Parties), subject(Parties), lists(AuditLogs)],
    ),
    (Mutation::ChangePlan, SUBSCRIPTION_CHANGED),
    (Mutation::CancelSubscription, SUBSCRIPTION_CHANGED),
];

/// Targets invalidated by `mutation`; empty if the table has no row for it.
#[must_use]
pub fn targets(mutation: Mutation) -> &'static [Target] {
    INVALIDATION_TABLE
        .iter()
        .find(|(m, _)| *m == mutation)
        .map_or(&[], |(_, targets)| *targets)
}

/// Concrete patterns invalidated by `mutation` on record `subject`.
#[must_use]
pub fn patterns(mutation: Mutation, subject: Option<&str>) -> Vec<KeyPattern> {
    targets(mutation)
        .iter()
        .map(|target| target.pattern(subject))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::QueryKey;
    use crate::core::query::QueryParams;
    use std::collections::HashSet;

    const EVERY_MUTATION: [Mutation; 18] = [
        Mutation::CreateInvoice,
        Mutation::UpdateInvoice,
        Mutation::DeleteInvoice,
        Mutation::FinalizeInvoice,
        Mutation::CancelInvoice,
        Mutation::RecordPayment,
        Mutation::CreateCreditNote,
        Mutation::FinalizeCreditNote,
        Mutation::CancelCreditNote,
        Mutation::CreateProduct,
        Mutation::UpdateProduct,
        Mutation::DeleteProduct,
        Mutation::AdjustStock,
        Mutation::CreateParty,
        Mutation::UpdateParty,
        Mutation::DeleteParty,
        Mutation::ChangePlan,
        Mutation::CancelSubscription,
    ];

    #[test]
    fn test_every_mutation_has_exactly_one_row() {
        for mutation in EVERY_MUTATION {
            let rows = INVALIDATION_TABLE
                .iter()
                .filter(|(m, _)| *m == mutation)
                .count();
            assert_eq!(rows, 1, "{mutation} should appear once");
            assert!(!targets(mutation).is_empty(), "{mutation} invalidates nothing");
        }
        assert_eq!(INVALIDATION_TABLE.len(), EVERY_MUTATION.len());
    }

    #[test]
    fn test_every_write_refreshes_its_own_lists() {
        let own = |m: Mutation| match m {
            Mutation::CreateInvoice
            | Mutation::UpdateInvoice
            | Mutation::DeleteInvoice
            | Mutation::FinalizeInvoice
            | Mutation::CancelInvoice
            | Mutation::RecordPayment => Resource::Invoices,
            Mutation::CreateCreditNote
            | Mutation::FinalizeCreditNote
            | Mutation::CancelCreditNote => Resource::CreditNotes,
            Mutation::CreateProduct
            | Mutation::UpdateProduct
            | Mutation::DeleteProduct
            | Mutation::AdjustStock => Resource::Products,
            Mutation::CreateParty | Mutation::UpdateParty | Mutation::DeleteParty => {
                Resource::Parties
            }
            Mutation::ChangePlan | Mutation::CancelSubscription => Resource::Subscription,
        };
        let list_key = |r: Resource| QueryKey::list(r, &QueryParams::new().with("page", 1));

        for mutation in EVERY_MUTATION {
            let key = list_key(own(mutation));
            assert!(
                patterns(mutation, Some("x1")).iter().any(|p| p.matches(&key)),
                "{mutation} leaves its own list stale"
            );
        }
    }

    #[test]
    fn test_adjust_stock_cascades_to_ledger_of_that_product_only() {
        let pats = patterns(Mutation::AdjustStock, Some("p1"));
        let hits = |key: &QueryKey| pats.iter().any(|p| p.matches(key));

        let page = QueryParams::new().with("page", 1).with("pageSize", 20);
        assert!(hits(&QueryKey::list(Resource::Products, &page)));
        assert!(hits(&QueryKey::detail(Resource::Products, "p1")));
        assert!(hits(&QueryKey::owned(Resource::StockLedger, "p1", &page)));

        assert!(!hits(&QueryKey::detail(Resource::Products, "p2")));
        assert!(!hits(&QueryKey::owned(Resource::StockLedger, "p2", &page)));
        assert!(!hits(&QueryKey::list(Resource::Invoices, &page)));
    }

    #[test]
    fn test_subject_without_id_widens_to_whole_resource() {
        let pats = patterns(Mutation::UpdateInvoice, None);
        assert!(pats.iter().any(|p| p.matches(&QueryKey::detail(Resource::Invoices, "any"))));
    }

    #[test]
    fn test_finalize_touches_reports() {
        let resources: HashSet<Resource> = targets(Mutation::FinalizeInvoice)
            .iter()
            .map(|t| t.resource)
            .collect();
        assert!(resources.contains(&Resource::GstReport));
        assert!(resources.contains(&Resource::StockLedger));
        assert!(!resources.contains(&Resource::Subscription));
    }

    #[test]
    fn test_idempotency_requirements() {
        assert!(Mutation::CreateInvoice.requires_idempotency_key());
        assert!(Mutation::FinalizeInvoice.requires_idempotency_key());
        assert!(!Mutation::UpdateProduct.requires_idempotency_key());
        assert!(!Mutation::AdjustStock.requires_idempotency_key());
    }
}
