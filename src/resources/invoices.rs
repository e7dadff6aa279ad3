//! Sales invoices.
//!
//! A draft invoice can be edited or deleted freely. Finalizing assigns the
//! invoice number, moves stock and posts the tax, after which the invoice
//! can only receive payments or be cancelled.

use super::{BillingClient, Validate, body, record_path, require_id, search_term};
use crate::{
    api::{ApiRequest, IdempotencyKey, Method, Money, Page, Pagination},
    cache::{Mutation, QueryObserver, Resource},
    core::{format::to_iso_date, query::QueryParams},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{fmt, str::FromStr};

const BASE: &str = "/invoices";

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Editable, not yet posted
    Draft,
    /// Posted, nothing paid
    Finalized,
    /// Posted, some amount received
    PartiallyPaid,
    /// Posted, fully settled
    Paid,
    /// Voided after posting
    Cancelled,
}

impl InvoiceStatus {
    /// Wire literal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Finalized => "FINALIZED",
            Self::PartiallyPaid => "PARTIALLY_PAID",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status filter of the invoice list. `All` sends no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Every status
    #[default]
    All,
    /// One status only
    Only(InvoiceStatus),
}

impl StatusFilter {
    /// Query value, `None` for `All`.
    #[must_use]
    pub const fn value(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Only(status) => Some(status.as_str()),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let status = match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "" | "ALL" => return Ok(Self::All),
            "DRAFT" => InvoiceStatus::Draft,
            "FINALIZED" => InvoiceStatus::Finalized,
            "PARTIALLY_PAID" => InvoiceStatus::PartiallyPaid,
            "PAID" => InvoiceStatus::Paid,
            "CANCELLED" => InvoiceStatus::Cancelled,
            other => {
                return Err(Error::validation(format!("Unknown invoice status '{other}'")));
            }
        };
        Ok(Self::Only(status))
    }
}

/// Filters of the invoice list, in the order they appear in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    /// Page and page size
    pub pagination: Pagination,
    /// Status filter
    pub status: StatusFilter,
    /// Only invoices of this party
    pub party_id: Option<String>,
    /// Free-text search over number and party name
    pub search: Option<String>,
    /// Issue date lower bound
    pub from: Option<NaiveDate>,
    /// Issue date upper bound
    pub to: Option<NaiveDate>,
}

impl InvoiceFilter {
    /// Query parameters for this filter.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("page", self.pagination.page)
            .with("pageSize", self.pagination.page_size)
            .with_opt("status", self.status.value())
            .with_opt("partyId", self.party_id.as_deref())
            .with_opt("search", search_term(self.search.as_deref()))
            .with_opt("from", self.from.map(to_iso_date))
            .with_opt("to", self.to.map(to_iso_date))
    }
}

/// One priced line of an invoice or credit note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    /// Product sold
    pub product_id: String,
    /// Line text, defaults to the product name server-side
    pub description: Option<String>,
    /// Quantity in the product's unit
    pub quantity: f64,
    /// Price per unit before tax
    pub unit_price: Money,
    /// GST rate in percent
    pub tax_rate: f64,
    /// Line total including tax
    pub amount: Money,
}

/// An invoice as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Record id
    pub id: String,
    /// Invoice number, assigned on finalize
    pub number: Option<String>,
    /// Billed party
    pub party_id: String,
    /// Billed party's display name
    pub party_name: Option<String>,
    /// Lifecycle state
    pub status: InvoiceStatus,
    /// Issue date
    pub issue_date: NaiveDate,
    /// Payment due date
    pub due_date: Option<NaiveDate>,
    /// Line items; list rows omit them
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
    /// Total before tax
    pub subtotal: Money,
    /// Total tax
    pub tax_total: Money,
    /// Grand total
    pub total: Money,
    /// Amount received so far
    pub amount_paid: Money,
}

impl Invoice {
    /// Amount still owed.
    #[must_use]
    pub fn balance_due(&self) -> f64 {
        (self.total.value() - self.amount_paid.value()).max(0.0)
    }
}

/// Line of an invoice being created or edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoiceLine {
    /// Product sold
    pub product_id: String,
    /// Quantity in the product's unit
    pub quantity: f64,
    /// Price per unit before tax
    pub unit_price: Money,
    /// GST rate in percent
    pub tax_rate: f64,
}

impl Validate for NewInvoiceLine {
    fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            return Err(Error::validation("Every line needs a product"));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(Error::validation("Quantity must be greater than zero"));
        }
        if !(self.unit_price.value().is_finite() && self.unit_price.value() >= 0.0) {
            return Err(Error::validation("Unit price cannot be negative"));
        }
        if !(0.0..=28.0).contains(&self.tax_rate) {
            return Err(Error::validation("Tax rate must be between 0% and 28%"));
        }
        Ok(())
    }
}

/// Draft invoice contents, used for both create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    /// Billed party
    pub party_id: String,
    /// Issue date
    pub issue_date: NaiveDate,
    /// Payment due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Line items
    pub lines: Vec<NewInvoiceLine>,
    /// Free-text notes printed on the invoice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for NewInvoice {
    fn validate(&self) -> Result<()> {
        if self.party_id.trim().is_empty() {
            return Err(Error::validation("Select a party for the invoice"));
        }
        if self.lines.is_empty() {
            return Err(Error::validation("Add at least one line item"));
        }
        if self.due_date.is_some_and(|due| due < self.issue_date) {
            return Err(Error::validation("Due date cannot be before the issue date"));
        }
        self.lines.iter().try_for_each(Validate::validate)
    }
}

/// How a payment was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash
    Cash,
    /// UPI transfer
    Upi,
    /// Debit or credit card
    Card,
    /// NEFT/RTGS/IMPS
    BankTransfer,
    /// Cheque
    Cheque,
}

/// Payment against a finalized invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Amount received
    pub amount: Money,
    /// Date received
    pub paid_on: NaiveDate,
    /// Payment channel
    pub method: PaymentMethod,
    /// Transaction or cheque reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Validate for Payment {
    fn validate(&self) -> Result<()> {
        if !(self.amount.value().is_finite() && self.amount.value() > 0.0) {
            return Err(Error::validation("Payment amount must be greater than zero"));
        }
        Ok(())
    }
}

impl BillingClient {
    /// Paged invoice list.
    #[must_use]
    pub fn invoices(&self, filter: &InvoiceFilter) -> QueryObserver<Page<Invoice>> {
        self.observe_list(Resource::Invoices, BASE, &filter.to_params())
    }

    /// One invoice; disabled while `id` is `None` or blank.
    #[must_use]
    pub fn invoice(&self, id: Option<&str>) -> QueryObserver<Invoice> {
        self.observe_detail(Resource::Invoices, BASE, id)
    }

    /// Creates a draft invoice.
    pub async fn create_invoice(&self, input: &NewInvoice, key: &IdempotencyKey) -> Result<Invoice> {
        let request = ApiRequest::write(Method::Post, BASE, Some(body(input)?))
            .with_idempotency_key(Some(key.clone()));
        self.mutate(Mutation::CreateInvoice, None, request).await
    }

    /// Replaces the contents of a draft invoice.
    pub async fn update_invoice(&self, id: &str, input: &NewInvoice) -> Result<Invoice> {
        let id = require_id(id, "Invoice")?;
        let request = ApiRequest::write(Method::Put, record_path(BASE, id), Some(body(input)?));
        self.mutate(Mutation::UpdateInvoice, Some(id), request).await
    }

    /// Deletes a draft invoice.
    pub async fn delete_invoice(&self, id: &str) -> Result<()> {
        let id = require_id(id, "Invoice")?;
        let request = ApiRequest::write(Method::Delete, record_path(BASE, id), None);
        self.mutate_without_body(Mutation::DeleteInvoice, Some(id), request)
            .await
    }

    /// Posts a draft invoice.
    pub async fn finalize_invoice(&self, id: &str, key: &IdempotencyKey) -> Result<Invoice> {
        let id = require_id(id, "Invoice")?;
        let path = format!("{}/finalize", record_path(BASE, id));
        let request =
            ApiRequest::write(Method::Post, path, None).with_idempotency_key(Some(key.clone()));
        self.mutate(Mutation::FinalizeInvoice, Some(id), request)
            .await
    }

    /// Voids a finalized invoice.
    pub async fn cancel_invoice(&self, id: &str, reason: Option<&str>) -> Result<Invoice> {
        let id = require_id(id, "Invoice")?;
        let body = reason.map(|reason| json!({ "reason": reason }));
        let path = format!("{}/cancel", record_path(BASE, id));
        let request = ApiRequest::write(Method::Post, path, body);
        self.mutate(Mutation::CancelInvoice, Some(id), request).await
    }

    /// Records a payment against a finalized invoice.
    pub async fn record_payment(
        &self,
        id: &str,
        payment: &Payment,
        key: &IdempotencyKey,
    ) -> Result<Invoice> {
        let id = require_id(id, "Invoice")?;
        let path = format!("{}/payments", record_path(BASE, id));
        let request = ApiRequest::write(Method::Post, path, Some(body(payment)?))
            .with_idempotency_key(Some(key.clone()));
        self.mutate(Mutation::RecordPayment, Some(id), request).await
    }
}
