//! GST summary, sales report and dashboard totals.
//!
//! Both reports are bounded by a [`DateRange`]. Their observers stay
//! disabled until the range is valid, so an incomplete or oversized
//! selection never reaches the backend.

use super::BillingClient;
use crate::{
    api::Money,
    cache::{QueryKey, QueryObserver, Resource},
    core::{
        date_range::DateRange,
        query::{QueryParams, with_query},
    },
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Tax totals for one GST rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstRateRow {
    /// GST rate in percent
    pub rate: f64,
    /// Value before tax
    pub taxable_value: Money,
    /// Central tax (intra-state)
    pub cgst: Money,
    /// State tax (intra-state)
    pub sgst: Money,
    /// Integrated tax (inter-state)
    pub igst: Money,
}

/// GST summary over a period, grouped by rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstSummary {
    /// First day covered
    pub from: NaiveDate,
    /// Last day covered
    pub to: NaiveDate,
    /// Per-rate rows
    pub rows: Vec<GstRateRow>,
    /// Sum of taxable values
    pub taxable_value: Money,
    /// Sum of CGST
    pub cgst: Money,
    /// Sum of SGST
    pub sgst: Money,
    /// Sum of IGST
    pub igst: Money,
    /// CGST + SGST + IGST
    pub total_tax: Money,
}

/// Net sales on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPoint {
    /// Calendar day
    pub date: NaiveDate,
    /// Sales less returns on that day
    pub net_sales: Money,
}

/// Sales totals over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    /// First day, inclusive
    pub from: NaiveDate,
    /// Last day, inclusive
    pub to: NaiveDate,
    /// Finalized invoices in the period
    pub invoice_count: u64,
    /// Invoiced total including tax
    pub gross_sales: Money,
    /// Credit notes in the period
    pub returns: Money,
    /// Gross sales less returns
    pub net_sales: Money,
    /// Payments received
    pub collected: Money,
    /// Still unpaid at the end of the period
    pub outstanding: Money,
    /// Daily series for the chart
    #[serde(default)]
    pub by_day: Vec<SalesPoint>,
}

/// Headline numbers for the home screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Net sales today
    pub today_sales: Money,
    /// Net sales this calendar month
    pub month_sales: Money,
    /// Receivables across all customers
    pub outstanding: Money,
    /// Invoices not yet finalized
    pub draft_invoices: u64,
    /// Products at or below their reorder level
    pub low_stock_products: u64,
}

fn range_params(range: &DateRange) -> QueryParams {
    QueryParams::new()
        .with("from", range.valid_start())
        .with("to", range.valid_end())
}

impl BillingClient {
    fn observe_report<T>(&self, resource: Resource, path: &str, range: &DateRange) -> QueryObserver<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let params = range_params(range);
        self.observe_path(
            QueryKey::list(resource, &params),
            range.is_valid(),
            with_query(path, &params),
        )
    }

    /// GST summary for `range`; disabled while the range is invalid.
    #[must_use]
    pub fn gst_summary(&self, range: &DateRange) -> QueryObserver<GstSummary> {
        self.observe_report(Resource::GstReport, "/reports/gst", range)
    }

    /// Sales report for `range`; disabled while the range is invalid.
    #[must_use]
    pub fn sales_report(&self, range: &DateRange) -> QueryObserver<SalesReport> {
        self.observe_report(Resource::SalesReport, "/reports/sales", range)
    }

    /// Home screen totals.
    #[must_use]
    pub fn dashboard(&self) -> QueryObserver<DashboardSummary> {
        self.observe_path(
            QueryKey::singleton(Resource::Dashboard),
            true,
            "/dashboard".to_string(),
        )
    }
}
