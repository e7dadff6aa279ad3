//! Shared test utilities for `billdesk`.
//!
//! Provides an in-memory database, a preference store that always fails and
//! a scripted transport standing in for the billing backend.

#![allow(clippy::unwrap_used)]

use crate::{
    api::{ApiClient, ApiRequest, ApiResponse, Method, RetryPolicy, Transport},
    cache::QueryClient,
    core::preferences::PreferenceStore,
    errors::{ApiError, Error, Result},
    resources::BillingClient,
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Preference store whose reads and writes always fail.
#[derive(Debug, Default)]
pub struct FailingPreferenceStore;

#[async_trait]
impl PreferenceStore for FailingPreferenceStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Config {
            message: "preference storage unavailable".to_string(),
        })
    }

    async fn put(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Config {
            message: "preference storage unavailable".to_string(),
        })
    }
}

/// Retry policy with millisecond delays so retry tests stay fast.
pub const fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

type Reply = std::result::Result<ApiResponse, ApiError>;

/// Transport that answers from scripted replies and records every request.
///
/// Replies are queued per method and path (query string included). Each
/// request consumes the next reply; the last one keeps answering once the
/// queue is down to it. Unscripted routes answer 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queues a JSON response.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        self.respond_raw(method, path, status, &body.to_string());
    }

    /// Queues a response with a raw body.
    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push(
            method,
            path,
            Ok(ApiResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    /// Queues a transport-level failure.
    pub fn fail(&self, method: Method, path: &str, error: ApiError) {
        self.push(method, path, Err(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received for one method and path.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method, request.path.clone())) else {
            return Ok(ApiResponse {
                status: 404,
                body: format!(r#"{{"message":"no route for {} {}"}}"#, request.method, request.path),
            });
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

/// Billing client over `transport` with a fresh cache.
pub fn billing_client(transport: &Arc<MockTransport>) -> BillingClient {
    let api = ApiClient::new(Arc::clone(transport) as Arc<dyn Transport>, fast_retry());
    BillingClient::new(api, QueryClient::new())
}
