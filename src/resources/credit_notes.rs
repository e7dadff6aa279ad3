//! Credit notes issued against finalized invoices.

use super::{BillingClient, Validate, body, record_path, require_id, search_term};
use crate::{
    api::{ApiRequest, IdempotencyKey, Method, Money, Page, Pagination},
    cache::{Mutation, QueryObserver, Resource},
    core::query::QueryParams,
    errors::{Error, Result},
    resources::invoices::{InvoiceLine, NewInvoiceLine},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const BASE: &str = "/credit-notes";

/// Lifecycle of a credit note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditNoteStatus {
    /// Editable, no stock or balance effect yet
    Draft,
    /// Posted against its invoice
    Finalized,
    /// Voided
    Cancelled,
}

impl CreditNoteStatus {
    /// Wire literal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Finalized => "FINALIZED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Filters of the credit note list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreditNoteFilter {
    /// Requested page
    pub pagination: Pagination,
    /// `None` lists every status
    pub status: Option<CreditNoteStatus>,
    /// Only notes crediting this invoice
    pub invoice_id: Option<String>,
    /// Free-text search on number or party
    pub search: Option<String>,
}

impl CreditNoteFilter {
    /// Query parameters in the order the backend documents them.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("page", self.pagination.page)
            .with("pageSize", self.pagination.page_size)
            .with_opt("status", self.status.map(CreditNoteStatus::as_str))
            .with_opt("invoiceId", self.invoice_id.as_deref())
            .with_opt("search", search_term(self.search.as_deref()))
    }
}

/// Credit note as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNote {
    /// Backend id
    pub id: String,
    /// Assigned on finalize
    pub number: Option<String>,
    /// Invoice being credited
    pub invoice_id: String,
    /// Customer of the credited invoice
    pub party_id: String,
    /// Lifecycle state
    pub status: CreditNoteStatus,
    /// Date printed on the note
    pub issue_date: NaiveDate,
    /// Free-text reason
    pub reason: Option<String>,
    /// Returned lines; omitted in list rows
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
    /// Credited amount including tax
    pub total: Money,
}

/// Body of a new credit note.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCreditNote {
    /// Finalized invoice to credit
    pub invoice_id: String,
    /// Date printed on the note
    pub issue_date: NaiveDate,
    /// Free-text reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Returned quantities; stock moves back in on finalize
    pub lines: Vec<NewInvoiceLine>,
}

impl Validate for NewCreditNote {
    fn validate(&self) -> Result<()> {
        if self.invoice_id.trim().is_empty() {
            return Err(Error::validation("Select the invoice to credit"));
        }
        if self.lines.is_empty() {
            return Err(Error::validation("Add at least one line item"));
        }
        self.lines.iter().try_for_each(Validate::validate)
    }
}

impl BillingClient {
    /// Paged credit note list.
    #[must_use]
    pub fn credit_notes(&self, filter: &CreditNoteFilter) -> QueryObserver<Page<CreditNote>> {
        self.observe_list(Resource::CreditNotes, BASE, &filter.to_params())
    }

    /// One credit note; disabled while `id` is `None` or blank.
    #[must_use]
    pub fn credit_note(&self, id: Option<&str>) -> QueryObserver<CreditNote> {
        self.observe_detail(Resource::CreditNotes, BASE, id)
    }

    /// Creates a draft credit note.
    pub async fn create_credit_note(
        &self,
        input: &NewCreditNote,
        key: &IdempotencyKey,
    ) -> Result<CreditNote> {
        let request = ApiRequest::write(Method::Post, BASE, Some(body(input)?))
            .with_idempotency_key(Some(key.clone()));
        self.mutate(Mutation::CreateCreditNote, None, request).await
    }

    /// Posts a draft credit note: stock returns and the invoice balance drops.
    pub async fn finalize_credit_note(&self, id: &str, key: &IdempotencyKey) -> Result<CreditNote> {
        let id = require_id(id, "Credit note")?;
        let path = format!("{}/finalize", record_path(BASE, id));
        let request =
            ApiRequest::write(Method::Post, path, None).with_idempotency_key(Some(key.clone()));
        self.mutate(Mutation::FinalizeCreditNote, Some(id), request)
            .await
    }

    /// Voids a credit note.
    pub async fn cancel_credit_note(&self, id: &str) -> Result<CreditNote> {
        let id = require_id(id, "Credit note")?;
        let path = format!("{}/cancel", record_path(BASE, id));
        let request = ApiRequest::write(Method::Post, path, None);
        self.mutate(Mutation::CancelCreditNote, Some(id), request)
            .await
    }
}
