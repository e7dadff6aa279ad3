/// Typed REST client with retry
pub mod client;
/// Wire types shared by every resource
pub mod models;
/// Transport seam and the `reqwest` implementation
pub mod transport;

pub use client::{ApiClient, RetryPolicy};
pub use models::{IdempotencyKey, Money, Page, Pagination};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
