//! Customers and suppliers.

use super::{BillingClient, Validate, body, record_path, require_id, search_term};
use crate::{
    api::{ApiRequest, Method, Money, Page, Pagination},
    cache::{Mutation, QueryObserver, Resource},
    core::query::QueryParams,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};

const BASE: &str = "/parties";

/// Length of a GSTIN.
const GSTIN_LEN: usize = 15;

/// Which side of a sale a party is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    /// Buys from the business
    Customer,
    /// Sells to the business
    Supplier,
}

impl PartyKind {
    /// Wire literal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Supplier => "supplier",
        }
    }
}

/// Filters of the party list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyFilter {
    /// Requested page
    pub pagination: Pagination,
    /// `None` lists both kinds
    pub kind: Option<PartyKind>,
    /// Free-text search on name, phone or GSTIN
    pub search: Option<String>,
}

impl PartyFilter {
    /// Query parameters for the list request.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("page", self.pagination.page)
            .with("pageSize", self.pagination.page_size)
            .with_opt("kind", self.kind.map(PartyKind::as_str))
            .with_opt("search", search_term(self.search.as_deref()))
    }
}

/// Customer or supplier record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    /// Backend id
    pub id: String,
    /// Display name
    pub name: String,
    /// Customer or supplier
    pub kind: PartyKind,
    /// GST registration number, if registered
    pub gstin: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Receivable (customer) or payable (supplier) balance
    pub balance: Money,
}

/// Body of a party create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParty {
    /// Display name, required
    pub name: String,
    /// Customer or supplier
    pub kind: PartyKind,
    /// 15-character GSTIN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    /// Contact phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Contact email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Billing address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Validate for NewParty {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Party name is required"));
        }
        if let Some(gstin) = &self.gstin {
            let gstin = gstin.trim();
            if gstin.len() != GSTIN_LEN || !gstin.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Error::validation("GSTIN must be 15 letters or digits"));
            }
        }
        if self.email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(Error::validation("Email address is not valid"));
        }
        Ok(())
    }
}

impl BillingClient {
    /// Paged party list.
    #[must_use]
    pub fn parties(&self, filter: &PartyFilter) -> QueryObserver<Page<Party>> {
        self.observe_list(Resource::Parties, BASE, &filter.to_params())
    }

    /// One party; disabled while `id` is `None` or blank.
    #[must_use]
    pub fn party(&self, id: Option<&str>) -> QueryObserver<Party> {
        self.observe_detail(Resource::Parties, BASE, id)
    }

    /// Creates a party.
    pub async fn create_party(&self, input: &NewParty) -> Result<Party> {
        let request = ApiRequest::write(Method::Post, BASE, Some(body(input)?));
        self.mutate(Mutation::CreateParty, None, request).await
    }

    /// Replaces a party's details.
    pub async fn update_party(&self, id: &str, input: &NewParty) -> Result<Party> {
        let id = require_id(id, "Party")?;
        let request = ApiRequest::write(Method::Put, record_path(BASE, id), Some(body(input)?));
        self.mutate(Mutation::UpdateParty, Some(id), request).await
    }

    /// Deletes a party without documents.
    pub async fn delete_party(&self, id: &str) -> Result<()> {
        let id = require_id(id, "Party")?;
        let request = ApiRequest::write(Method::Delete, record_path(BASE, id), None);
        self.mutate_without_body(Mutation::DeleteParty, Some(id), request)
            .await
    }
}
