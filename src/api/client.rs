//! REST client for the billing backend.
//!
//! Adds status handling, typed decoding and retries on top of a
//! [`Transport`]. Reads are retried on transient failures. Writes are only
//! retried when they carry an idempotency key, so a retried write can never
//! create a second record.

use crate::{
    api::{
        models::ErrorBody,
        transport::{ApiRequest, ApiResponse, Method, Transport},
    },
    errors::ApiError,
};
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Backoff settings for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: usize,
    /// First backoff delay
    pub min_delay: Duration,
    /// Upper bound on a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Typed access to the backend.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// `GET path` decoded as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    /// Sends `request` and decodes the body as `T`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(&request).await?;
        decode(&request.path, &response.body)
    }

    /// Sends `request` and ignores the body.
    pub async fn send_without_body(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(&request).await.map(|_| ())
    }

    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let attempt = || async {
            let response = self.transport.send(request).await?;
            check_status(response)
        };

        let retryable = request.method == Method::Get || request.idempotency_key.is_some();
        if !retryable || self.retry.max_retries == 0 {
            return attempt().await;
        }

        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.retry.min_delay)
                    .with_max_delay(self.retry.max_delay)
                    .with_max_times(self.retry.max_retries)
                    .with_jitter(),
            )
            .when(ApiError::should_retry)
            .notify(|e, dur| {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    "Request failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                );
            })
            .await
    }
}

fn check_status(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status;
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("Request failed with status {status}"));
    debug!(status, %message, "Server rejected request");
    Err(ApiError::Server { status, message })
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        warn!(path, error = %e, "Response did not match expected shape");
        ApiError::MalformedResponse {
            path: path.to_string(),
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::api::models::{IdempotencyKey, Page};
    use crate::test_utils::{MockTransport, fast_retry};
    use serde_json::json;

    fn client(transport: &Arc<MockTransport>) -> ApiClient {
        ApiClient::new(Arc::clone(transport) as Arc<dyn Transport>, fast_retry())
    }

    #[tokio::test]
    async fn test_get_decodes_page() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            Method::Get,
            "/numbers?page=1",
            200,
            json!({"data": [1, 2], "page": 1, "pageSize": 2, "total": 2, "totalPages": 1}),
        );

        let page: Page<u32> = client(&transport).get("/numbers?page=1").await.unwrap();
        assert_eq!(page.data, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_malformed_body_is_typed_error() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Get, "/numbers", 200, json!({"items": []}));

        let err = client(&transport)
            .get::<Page<u32>>("/numbers")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { ref path, .. } if path == "/numbers"));
    }

    #[tokio::test]
    async fn test_server_message_is_surfaced() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            Method::Post,
            "/invoices/inv-1/finalize",
            422,
            json!({"message": "Invoice has no line items"}),
        );

        let err = client(&transport)
            .send_without_body(ApiRequest::write(
                Method::Post,
                "/invoices/inv-1/finalize",
                None,
            ))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 422,
                message: "Invoice has no line items".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_status_without_body_gets_generic_message() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_raw(Method::Get, "/parties", 403, "");

        let err = client(&transport).get::<Page<u32>>("/parties").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 403,
                message: "Request failed with status 403".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reads_retry_transient_failures() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(Method::Get, "/dashboard", ApiError::Timeout);
        transport.respond(Method::Get, "/dashboard", 200, json!(5));

        let value: u32 = client(&transport).get("/dashboard").await.unwrap();
        assert_eq!(value, 5);
        assert_eq!(transport.count(Method::Get, "/dashboard"), 2);
    }

    #[tokio::test]
    async fn test_writes_without_key_are_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Put, "/products/p1", 503, json!({"error": "down"}));
        transport.respond(Method::Put, "/products/p1", 200, json!({}));

        let result = client(&transport)
            .send_without_body(ApiRequest::write(Method::Put, "/products/p1", None))
            .await;
        assert!(result.is_err());
        assert_eq!(transport.count(Method::Put, "/products/p1"), 1);
    }

    #[tokio::test]
    async fn test_keyed_writes_retry_with_the_same_key() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(
            Method::Post,
            "/invoices",
            ApiError::Transport {
                message: "connection reset".to_string(),
            },
        );
        transport.respond(Method::Post, "/invoices", 201, json!(1));

        let key = IdempotencyKey::generate();
        let request = ApiRequest::write(Method::Post, "/invoices", Some(json!({})))
            .with_idempotency_key(Some(key.clone()));
        let id: u32 = client(&transport).send(request).await.unwrap();
        assert_eq!(id, 1);

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.idempotency_key.as_ref() == Some(&key)));
    }

    #[tokio::test]
    async fn test_business_rejections_are_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Get, "/invoices/x", 404, json!({"message": "Not found"}));

        let err = client(&transport).get::<u32>("/invoices/x").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(transport.count(Method::Get, "/invoices/x"), 1);
    }
}
