//! Query cache - keyed snapshots of backend reads, request de-duplication and
//! the invalidation graph that keeps reads consistent with writes.

/// Async client with shared in-flight requests and observers
pub mod client;
/// Mutation → stale key table
pub mod invalidation;
/// Cache keys and key patterns
pub mod key;
/// Synchronous snapshot store
pub mod store;

pub use client::{QueryClient, QueryObserver, QueryResult};
pub use invalidation::{INVALIDATION_TABLE, Mutation, Scope, Target};
pub use key::{IdMatch, KeyPattern, QueryKey, Resource};
pub use store::{Completion, DiscardReason, QueryCache};
