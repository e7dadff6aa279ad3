//! Subscription plan of the business account.

use super::BillingClient;
use crate::{
    api::{ApiRequest, Method},
    cache::{Mutation, QueryKey, QueryObserver, Resource},
    errors::Result,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

const PATH: &str = "/subscription";

/// Available plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Limited monthly invoices
    Free,
    /// Single user, unlimited invoices
    Starter,
    /// Multiple users and advanced reports
    Business,
}

/// Billing state of the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial of a paid plan
    Trialing,
    /// Paid up
    Active,
    /// Renewal payment failed
    PastDue,
    /// Ends with the current period
    Cancelled,
}

/// Current subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Current plan
    pub plan: Plan,
    /// Billing state
    pub status: SubscriptionStatus,
    /// End of the paid period; `None` on the free plan
    pub current_period_end: Option<NaiveDate>,
    /// Monthly invoice allowance; `None` when unlimited
    pub invoice_limit: Option<u64>,
    /// Invoices created this month
    pub invoices_used: u64,
}

impl Subscription {
    /// Invoices left this month, `None` when unlimited.
    #[must_use]
    pub fn invoices_remaining(&self) -> Option<u64> {
        self.invoice_limit
            .map(|limit| limit.saturating_sub(self.invoices_used))
    }
}

impl BillingClient {
    /// The account's subscription.
    #[must_use]
    pub fn subscription(&self) -> QueryObserver<Subscription> {
        self.observe_path(
            QueryKey::singleton(Resource::Subscription),
            true,
            PATH.to_string(),
        )
    }

    /// Switches plan; takes effect immediately.
    pub async fn change_plan(&self, plan: Plan) -> Result<Subscription> {
        let request = ApiRequest::write(Method::Put, PATH, Some(json!({ "plan": plan })));
        self.mutate(Mutation::ChangePlan, None, request).await
    }

    /// Cancels at the end of the current period.
    pub async fn cancel_subscription(&self) -> Result<Subscription> {
        let request = ApiRequest::write(Method::Post, format!("{PATH}/cancel"), None);
        self.mutate(Mutation::CancelSubscription, None, request)
            .await
    }
}
