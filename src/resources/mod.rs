//! Resource reads and writes.
//!
//! [`BillingClient`] ties the REST client to the query cache. Reads are
//! exposed as [`QueryObserver`]s keyed by resource and filter values. Writes
//! all go through one path that sends the request and, only when the server
//! accepted it, applies the mutation's row of the invalidation table. A
//! rejected write leaves every cached snapshot as it was.
//!
//! Each resource lives in its own module and adds its operations to
//! [`BillingClient`] through a separate `impl` block.

pub mod audit_logs;
pub mod credit_notes;
pub mod invoices;
pub mod parties;
pub mod products;
pub mod reports;
pub mod subscription;

use crate::{
    api::{ApiClient, ApiRequest},
    cache::{Mutation, QueryClient, QueryKey, QueryObserver, Resource},
    core::query::{QueryParams, with_query},
    errors::{ApiError, Error, Result},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{error, info};

/// Local checks run before a write is sent.
pub trait Validate {
    /// Returns a [`Error::Validation`] describing the first problem found.
    fn validate(&self) -> Result<()>;
}

/// Client for every billing resource.
#[derive(Debug, Clone)]
pub struct BillingClient {
    api: ApiClient,
    queries: QueryClient,
}

impl BillingClient {
    /// Combines a REST client with a query cache.
    #[must_use]
    pub const fn new(api: ApiClient, queries: QueryClient) -> Self {
        Self { api, queries }
    }

    /// Underlying REST client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Underlying query cache.
    #[must_use]
    pub const fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Observer that `GET`s `path` whenever `key` needs data.
    fn observe_path<T>(&self, key: QueryKey, enabled: bool, path: String) -> QueryObserver<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let api = self.api.clone();
        self.queries.observe(key, enabled, move || {
            let api = api.clone();
            let path = path.clone();
            async move { api.get::<T>(&path).await }
        })
    }

    /// Paged or filtered list at `base`.
    fn observe_list<T>(&self, resource: Resource, base: &str, params: &QueryParams) -> QueryObserver<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.observe_path(
            QueryKey::list(resource, params),
            true,
            with_query(base, params),
        )
    }

    /// Single record at `base/{id}`. Disabled until an id is known.
    fn observe_detail<T>(&self, resource: Resource, base: &str, id: Option<&str>) -> QueryObserver<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let id = id.map(str::trim).unwrap_or_default();
        self.observe_path(
            QueryKey::detail(resource, id),
            !id.is_empty(),
            record_path(base, id),
        )
    }

    /// Sends a write and decodes the response as `T`.
    async fn mutate<T: DeserializeOwned>(
        &self,
        mutation: Mutation,
        subject: Option<&str>,
        request: ApiRequest,
    ) -> Result<T> {
        check_idempotency(mutation, &request)?;
        let outcome = self.api.send::<T>(request).await;
        self.settle(mutation, subject, outcome)
    }

    /// Sends a write whose response body is irrelevant, e.g. a `DELETE`.
    async fn mutate_without_body(
        &self,
        mutation: Mutation,
        subject: Option<&str>,
        request: ApiRequest,
    ) -> Result<()> {
        check_idempotency(mutation, &request)?;
        let outcome = self.api.send_without_body(request).await;
        self.settle(mutation, subject, outcome)
    }

    fn settle<T>(
        &self,
        mutation: Mutation,
        subject: Option<&str>,
        outcome: std::result::Result<T, ApiError>,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                let stale = self.queries.invalidate_mutation(mutation, subject);
                info!(%mutation, subject, stale, "Write succeeded");
                Ok(value)
            }
            Err(e) => {
                error!(%mutation, subject, error = %e, "Write failed");
                Err(e.into())
            }
        }
    }
}

fn check_idempotency(mutation: Mutation, request: &ApiRequest) -> Result<()> {
    if mutation.requires_idempotency_key() && request.idempotency_key.is_none() {
        return Err(ApiError::MissingIdempotencyKey {
            operation: mutation.name().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validates `input` and encodes it as a JSON body.
fn body<B: Serialize + Validate>(input: &B) -> Result<serde_json::Value> {
    input.validate()?;
    Ok(serde_json::to_value(input)?)
}

/// Trimmed record id, rejecting blanks before they become a bad URL.
fn require_id<'a>(id: &'a str, what: &str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::validation(format!("{what} id is required")));
    }
    Ok(id)
}

/// `base/{id}` with `id` percent-encoded as a single path segment.
fn record_path(base: &str, id: &str) -> String {
    format!("{base}/{}", urlencoding::encode(id))
}

/// Trimmed text filter, `None` when blank.
fn search_term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}
