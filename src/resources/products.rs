//! Product catalogue and stock.
//!
//! Stock levels change through invoices, credit notes and manual
//! adjustments. Every change is recorded as a [`StockMovement`] in the
//! product's ledger.

use super::{BillingClient, Validate, body, record_path, require_id, search_term};
use crate::{
    api::{ApiRequest, Method, Money, Page, Pagination},
    cache::{Mutation, QueryKey, QueryObserver, Resource},
    core::query::{QueryParams, with_query},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BASE: &str = "/products";

/// GST slabs accepted for products.
pub const GST_RATES: [f64; 7] = [0.0, 0.25, 3.0, 5.0, 12.0, 18.0, 28.0];

/// Filters of the product list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Page and page size
    pub pagination: Pagination,
    /// Matches name, SKU or HSN code
    pub search: Option<String>,
    /// Only products at or below their threshold; `false` sends nothing
    pub low_stock: bool,
}

impl ProductFilter {
    /// Query parameters for this filter.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("page", self.pagination.page)
            .with("pageSize", self.pagination.page_size)
            .with_opt("search", search_term(self.search.as_deref()))
            .with_opt("lowStock", self.low_stock.then_some(true))
    }
}

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Record id
    pub id: String,
    /// Display name
    pub name: String,
    /// Stock keeping unit
    pub sku: Option<String>,
    /// HSN/SAC classification code
    pub hsn_code: Option<String>,
    /// Unit of measure, e.g. `pcs` or `kg`
    pub unit: String,
    /// Selling price before tax
    pub price: Money,
    /// GST rate in percent
    pub tax_rate: f64,
    /// Quantity on hand
    pub stock: f64,
    /// Level at which the product counts as low on stock
    pub low_stock_threshold: Option<f64>,
}

impl Product {
    /// True when stock is at or below the threshold.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold
            .is_some_and(|threshold| self.stock <= threshold)
    }
}

/// Product contents for create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Stock keeping unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// HSN/SAC classification code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,
    /// Unit of measure
    pub unit: String,
    /// Selling price before tax
    pub price: Money,
    /// GST rate in percent, one of [`GST_RATES`]
    pub tax_rate: f64,
    /// Stock on hand at creation; ignored on update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_stock: Option<f64>,
    /// Low-stock threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_stock_threshold: Option<f64>,
}

impl Validate for NewProduct {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Product name is required"));
        }
        if self.unit.trim().is_empty() {
            return Err(Error::validation("Unit is required"));
        }
        if !(self.price.value().is_finite() && self.price.value() >= 0.0) {
            return Err(Error::validation("Price cannot be negative"));
        }
        if !GST_RATES
            .iter()
            .any(|rate| (rate - self.tax_rate).abs() < f64::EPSILON)
        {
            return Err(Error::validation(format!(
                "{}% is not a valid GST rate",
                self.tax_rate
            )));
        }
        if self.opening_stock.is_some_and(|q| !(q.is_finite() && q >= 0.0)) {
            return Err(Error::validation("Opening stock cannot be negative"));
        }
        Ok(())
    }
}

/// Manual stock correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    /// Signed change in quantity
    pub quantity: f64,
    /// Why stock changed, e.g. `damaged` or `recount`
    pub reason: String,
    /// Free-text note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Validate for StockAdjustment {
    fn validate(&self) -> Result<()> {
        if !self.quantity.is_finite() || self.quantity.abs() < f64::EPSILON {
            return Err(Error::validation("Adjustment quantity cannot be zero"));
        }
        if self.reason.trim().is_empty() {
            return Err(Error::validation("Give a reason for the adjustment"));
        }
        Ok(())
    }
}

/// What caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Stock entered at product creation
    Opening,
    /// Goods received
    Purchase,
    /// Finalized invoice
    Sale,
    /// Finalized credit note
    Return,
    /// Manual correction
    Adjustment,
}

/// One entry of a product's stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    /// Record id
    pub id: String,
    /// Product the movement belongs to
    pub product_id: String,
    /// Cause
    pub kind: MovementKind,
    /// Signed change in quantity
    pub quantity: f64,
    /// Quantity on hand after the movement
    pub balance: f64,
    /// Invoice or credit note number, adjustment reason
    pub reference: Option<String>,
    /// When the movement was recorded
    pub created_at: DateTime<Utc>,
}

impl BillingClient {
    /// Paged product list.
    #[must_use]
    pub fn products(&self, filter: &ProductFilter) -> QueryObserver<Page<Product>> {
        self.observe_list(Resource::Products, BASE, &filter.to_params())
    }

    /// One product; disabled while `id` is `None` or blank.
    #[must_use]
    pub fn product(&self, id: Option<&str>) -> QueryObserver<Product> {
        self.observe_detail(Resource::Products, BASE, id)
    }

    /// Paged stock ledger of one product; disabled without a product id.
    #[must_use]
    pub fn stock_ledger(
        &self,
        product_id: Option<&str>,
        pagination: Pagination,
    ) -> QueryObserver<Page<StockMovement>> {
        let id = product_id.map(str::trim).unwrap_or_default();
        let params = QueryParams::new()
            .with("page", pagination.page)
            .with("pageSize", pagination.page_size);
        self.observe_path(
            QueryKey::owned(Resource::StockLedger, id, &params),
            !id.is_empty(),
            with_query(&format!("{}/stock-ledger", record_path(BASE, id)), &params),
        )
    }

    /// Adds a product to the catalogue.
    pub async fn create_product(&self, input: &NewProduct) -> Result<Product> {
        let request = ApiRequest::write(Method::Post, BASE, Some(body(input)?));
        self.mutate(Mutation::CreateProduct, None, request).await
    }

    /// Replaces a product's catalogue details; stock changes go through
    /// [`BillingClient::adjust_stock`].
    pub async fn update_product(&self, id: &str, input: &NewProduct) -> Result<Product> {
        let id = require_id(id, "Product")?;
        let request = ApiRequest::write(Method::Put, record_path(BASE, id), Some(body(input)?));
        self.mutate(Mutation::UpdateProduct, Some(id), request).await
    }

    /// Removes a product never used on a document.
    pub async fn delete_product(&self, id: &str) -> Result<()> {
        let id = require_id(id, "Product")?;
        let request = ApiRequest::write(Method::Delete, record_path(BASE, id), None);
        self.mutate_without_body(Mutation::DeleteProduct, Some(id), request)
            .await
    }

    /// Applies a manual stock correction and returns the updated product.
    ///
    /// Refreshes the product lists, this product and its stock ledger.
    pub async fn adjust_stock(&self, product_id: &str, adjustment: &StockAdjustment) -> Result<Product> {
        let id = require_id(product_id, "Product")?;
        let request = ApiRequest::write(
            Method::Post,
            format!("{}/stock-adjustments", record_path(BASE, id)),
            Some(body(adjustment)?),
        );
        self.mutate(Mutation::AdjustStock, Some(id), request).await
    }
}
