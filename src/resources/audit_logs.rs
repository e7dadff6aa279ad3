//! Read-only audit trail of every write made through the backend.

use super::{BillingClient, search_term};
use crate::{
    api::{Page, Pagination},
    cache::{QueryObserver, Resource},
    core::{format::to_iso_date, query::QueryParams},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Filters of the audit log list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Requested page
    pub pagination: Pagination,
    /// Entity type, e.g. `invoice`
    pub entity: Option<String>,
    /// Action, e.g. `finalize`
    pub action: Option<String>,
    /// Earliest day, inclusive
    pub from: Option<NaiveDate>,
    /// Latest day, inclusive
    pub to: Option<NaiveDate>,
}

impl AuditFilter {
    /// Query parameters for the list request.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("page", self.pagination.page)
            .with("pageSize", self.pagination.page_size)
            .with_opt("entity", search_term(self.entity.as_deref()))
            .with_opt("action", search_term(self.action.as_deref()))
            .with_opt("from", self.from.map(to_iso_date))
            .with_opt("to", self.to.map(to_iso_date))
    }
}

/// One recorded change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Entry id
    pub id: String,
    /// Entity type that changed
    pub entity: String,
    /// Id of the changed record, if it had one
    pub entity_id: Option<String>,
    /// What was done, e.g. `create`
    pub action: String,
    /// User who made the change; `None` for system jobs
    pub actor: Option<String>,
    /// When the change was made
    pub created_at: DateTime<Utc>,
    /// Changed fields as sent by the backend
    pub details: Option<serde_json::Value>,
}

impl BillingClient {
    /// Paged audit trail.
    #[must_use]
    pub fn audit_logs(&self, filter: &AuditFilter) -> QueryObserver<Page<AuditEntry>> {
        self.observe_list(Resource::AuditLogs, "/audit-logs", &filter.to_params())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        api::Method,
        errors::Result,
        resources::parties::{NewParty, PartyKind},
        test_utils::{MockTransport, billing_client},
    };
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_entries_decode_and_refresh_after_writes() -> Result<()> {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            Method::Get,
            "/audit-logs?page=1&pageSize=20&entity=party",
            200,
            json!({
                "data": [{
                    "id": "a1", "entity": "party", "entityId": "party-1",
                    "action": "create", "actor": "owner@example.com",
                    "createdAt": "2026-10-18T10:00:00Z", "details": {"name": "Acme"}
                }],
                "page": 1, "pageSize": 20, "total": 1, "totalPages": 1
            }),
        );
        transport.respond(
            Method::Post,
            "/parties",
            201,
            json!({
                "id": "party-2", "name": "Globex", "kind": "supplier",
                "gstin": null, "phone": null, "email": null, "balance": "0.00"
            }),
        );
        let client = billing_client(&transport);

        let logs = client.audit_logs(&AuditFilter {
            entity: Some("party".to_string()),
            ..AuditFilter::default()
        });
        let page = logs.fetch().await.data.unwrap();
        assert_eq!(page.data[0].action, "create");

        client
            .create_party(&NewParty {
                name: "Globex".to_string(),
                kind: PartyKind::Supplier,
                gstin: None,
                phone: None,
                email: None,
                address: None,
            })
            .await?;
        assert!(logs.snapshot().is_stale);
        Ok(())
    }
}
