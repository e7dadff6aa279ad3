//! Async query client.
//!
//! Wraps [`QueryCache`] with request de-duplication: the first caller that
//! needs a key issues the request, every concurrent caller for the same key
//! awaits that same request through a shared future. Views hold a
//! [`QueryObserver`] per query; dropping it is teardown.

use crate::{
    cache::{
        invalidation::{self, Mutation},
        key::{KeyPattern, QueryKey},
        store::{Completion, FetchTicket, Payload, QueryCache},
    },
    errors::ApiError,
};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    marker::PhantomData,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// How many times a read follows superseded requests before settling for the
/// current snapshot.
const MAX_FETCH_ROUNDS: usize = 3;

/// Unobserved entries that keep their data for the next view of the same key.
const MAX_IDLE_ENTRIES: usize = 64;

type SharedFetch = Shared<BoxFuture<'static, Completion>>;

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

struct InFlight {
    generation: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct ClientState {
    cache: QueryCache,
    in_flight: HashMap<QueryKey, InFlight>,
}

fn lock(state: &Mutex<ClientState>) -> MutexGuard<'_, ClientState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to the query cache.
#[derive(Clone, Default)]
pub struct QueryClient {
    state: Arc<Mutex<ClientState>>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("QueryClient")
            .field("entries", &state.cache.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

enum Step {
    Fresh,
    Wait(SharedFetch),
    Superseded,
}

impl QueryClient {
    /// Creates a client with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer of `key`. Reads go through `fetcher` when the
    /// entry needs data; a disabled observer never fetches.
    pub fn observe<T, F, Fut>(&self, key: QueryKey, enabled: bool, fetcher: F) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        lock(&self.state).cache.add_observer(&key);
        QueryObserver {
            client: self.clone(),
            key,
            enabled,
            fetcher: Arc::new(move || fetcher().boxed()),
            _marker: PhantomData,
        }
    }

    /// Applies the invalidation table row for a successful `mutation` on
    /// `subject`. Returns how many cached keys went stale.
    pub fn invalidate_mutation(&self, mutation: Mutation, subject: Option<&str>) -> usize {
        let patterns = invalidation::patterns(mutation, subject);
        let count: usize = patterns.iter().map(|p| self.invalidate(p)).sum();
        debug!(%mutation, subject, count, "Invalidated cache after write");
        count
    }

    /// Marks every key matching `pattern` stale. Returns how many matched.
    ///
    /// In-flight requests for those keys are superseded; the next read
    /// issues a new one.
    pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let (count, superseded) = {
            let mut state = lock(&self.state);
            let hit = state.cache.invalidate(pattern);
            let superseded: Vec<InFlight> = hit
                .iter()
                .filter_map(|key| state.in_flight.remove(key))
                .collect();
            (hit.len(), superseded)
        };
        drop(superseded);
        count
    }

    /// Marks one key stale.
    pub fn invalidate_key(&self, key: &QueryKey) -> bool {
        let (hit, superseded) = {
            let mut state = lock(&self.state);
            let hit = state.cache.invalidate_key(key);
            (hit, state.in_flight.remove(key))
        };
        drop(superseded);
        hit
    }

    /// True if `key` is tracked and stale.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        lock(&self.state).cache.is_stale(key)
    }

    fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryResult<T> {
        let snap = lock(&self.state).cache.lookup(key);
        let Some(snap) = snap else {
            return QueryResult::empty();
        };
        let data = snap.data.and_then(|payload| match payload.downcast::<T>() {
            Ok(data) => Some(data),
            Err(_) => {
                warn!(key = %key, "Cached payload has unexpected type");
                None
            }
        });
        QueryResult {
            data,
            is_pending: snap.pending,
            is_stale: snap.stale,
            error: snap.error,
        }
    }

    fn begin_or_join(
        &self,
        key: &QueryKey,
        start: impl FnOnce() -> BoxFuture<'static, Result<Payload, ApiError>>,
    ) -> Step {
        let ticket = {
            let mut state = lock(&self.state);
            if !state.cache.needs_fetch(key) {
                return Step::Fresh;
            }
            if let Some(flight) = state.in_flight.get(key) {
                debug!(key = %key, "Joining in-flight request");
                return Step::Wait(flight.future.clone());
            }
            state.cache.begin_fetch(key)
        };

        // The fetcher may call back into this client
        let request = start();

        let mut state = lock(&self.state);
        if !state.cache.is_current(&ticket) {
            if let Some(flight) = state.in_flight.get(key) {
                debug!(key = %key, "Joining request issued meanwhile");
                return Step::Wait(flight.future.clone());
            }
            return Step::Superseded;
        }

        let generation = ticket.generation;
        let shared_state = Arc::clone(&self.state);
        let future = async move {
            let result = request.await;
            finish(&shared_state, &ticket, result)
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                future: future.clone(),
            },
        );
        Step::Wait(future)
    }

    fn release(&self, key: &QueryKey) {
        let superseded = {
            let mut state = lock(&self.state);
            if state.cache.remove_observer(key) == 0 {
                let flight = state.in_flight.remove(key);
                state.cache.evict_idle(MAX_IDLE_ENTRIES);
                flight
            } else {
                None
            }
        };
        drop(superseded);
    }
}

fn finish(
    state: &Mutex<ClientState>,
    ticket: &FetchTicket,
    result: Result<Payload, ApiError>,
) -> Completion {
    let mut state = lock(state);
    if state
        .in_flight
        .get(&ticket.key)
        .is_some_and(|f| f.generation == ticket.generation)
    {
        state.in_flight.remove(&ticket.key);
    }
    state.cache.complete(ticket, result)
}

/// What a view sees for one query.
#[derive(Debug)]
pub struct QueryResult<T> {
    /// Last successfully fetched data, possibly stale
    pub data: Option<Arc<T>>,
    /// A request for this query is in flight
    pub is_pending: bool,
    /// The data is known to be out of date
    pub is_stale: bool,
    /// Error of the most recent failed fetch
    pub error: Option<ApiError>,
}

impl<T> QueryResult<T> {
    const fn empty() -> Self {
        Self {
            data: None,
            is_pending: false,
            is_stale: false,
            error: None,
        }
    }
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_pending: self.is_pending,
            is_stale: self.is_stale,
            error: self.error.clone(),
        }
    }
}

/// One view's subscription to a cache key.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    enabled: bool,
    fetcher: Fetcher<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    /// Key this observer reads.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// False when the query is gated off (e.g. no id or no valid date range).
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current cache state without issuing a request.
    #[must_use]
    pub fn snapshot(&self) -> QueryResult<T> {
        self.client.snapshot(&self.key)
    }

    /// Returns fresh data, fetching it if needed.
    ///
    /// Concurrent calls for the same key share one request. If the request
    /// is superseded while in flight, the read follows the newer one.
    pub async fn fetch(&self) -> QueryResult<T> {
        if !self.enabled {
            return self.snapshot();
        }

        for _ in 0..MAX_FETCH_ROUNDS {
            let fetcher = Arc::clone(&self.fetcher);
            let step = self.client.begin_or_join(&self.key, move || {
                let request = fetcher();
                async move { request.await.map(|data| Arc::new(data) as Payload) }.boxed()
            });

            let pending = match step {
                Step::Fresh => return self.snapshot(),
                Step::Superseded => continue,
                Step::Wait(pending) => pending,
            };

            match pending.await {
                Completion::Applied => return self.snapshot(),
                Completion::Discarded(reason) => {
                    debug!(key = %self.key, ?reason, "Request superseded; re-reading");
                }
            }
        }

        self.snapshot()
    }

    /// Marks the key stale and fetches it again.
    pub async fn refetch(&self) -> QueryResult<T> {
        self.client.invalidate_key(&self.key);
        self.fetch().await
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.client.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::cache::key::Resource;
    use crate::core::query::QueryParams;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    type Reply = Result<i32, ApiError>;

    fn invoices(page: i64) -> QueryKey {
        QueryKey::list(Resource::Invoices, &QueryParams::new().with("page", page))
    }

    /// Answers each request from the next queued oneshot receiver.
    #[derive(Clone, Default)]
    struct Scripted {
        replies: Arc<Mutex<VecDeque<oneshot::Receiver<Reply>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn push(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fetcher(&self) -> impl Fn() -> BoxFuture<'static, Reply> + Send + Sync + 'static {
            let this = self.clone();
            move || {
                this.calls.fetch_add(1, Ordering::SeqCst);
                let reply = this.replies.lock().unwrap().pop_front();
                async move {
                    match reply {
                        Some(rx) => rx.await.unwrap_or_else(|_| {
                            Err(ApiError::Transport {
                                message: "reply dropped".to_string(),
                            })
                        }),
                        None => Err(ApiError::Transport {
                            message: "no scripted reply".to_string(),
                        }),
                    }
                }
                .boxed()
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_request() {
        let client = QueryClient::new();
        let script = Scripted::default();
        let reply = script.push();

        let a = client.observe(invoices(1), true, script.fetcher());
        let b = client.observe(invoices(1), true, script.fetcher());

        let (ra, rb, ()) = tokio::join!(a.fetch(), b.fetch(), async move {
            reply.send(Ok(5)).unwrap();
        });

        assert_eq!(script.calls(), 1);
        assert_eq!(ra.data.as_deref(), Some(&5));
        assert_eq!(rb.data.as_deref(), Some(&5));
        assert!(!ra.is_pending);
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_from_cache() {
        let client = QueryClient::new();
        let script = Scripted::default();
        script.push().send(Ok(1)).unwrap();

        let first = client.observe(invoices(1), true, script.fetcher());
        assert_eq!(first.fetch().await.data.as_deref(), Some(&1));

        let second = client.observe(invoices(1), true, script.fetcher());
        assert_eq!(second.fetch().await.data.as_deref(), Some(&1));
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let client = QueryClient::new();
        let script = Scripted::default();
        script.push().send(Ok(1)).unwrap();
        script.push().send(Ok(2)).unwrap();

        let page1 = client.observe(invoices(1), true, script.fetcher());
        let page2 = client.observe(invoices(2), true, script.fetcher());
        assert_eq!(page1.fetch().await.data.as_deref(), Some(&1));
        assert_eq!(page2.fetch().await.data.as_deref(), Some(&2));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn test_disabled_observer_never_fetches() {
        let client = QueryClient::new();
        let script = Scripted::default();
        let detail = client.observe(
            QueryKey::detail(Resource::Invoices, ""),
            false,
            script.fetcher(),
        );

        let result = detail.fetch().await;
        assert!(result.data.is_none());
        assert!(!result.is_pending);
        assert_eq!(script.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_previous_data() {
        let client = QueryClient::new();
        let script = Scripted::default();
        script.push().send(Ok(4)).unwrap();
        script
            .push()
            .send(Err(ApiError::Server {
                status: 500,
                message: "boom".to_string(),
            }))
            .unwrap();

        let obs = client.observe(invoices(1), true, script.fetcher());
        assert_eq!(obs.fetch().await.data.as_deref(), Some(&4));

        let result = obs.refetch().await;
        assert_eq!(result.data.as_deref(), Some(&4));
        assert_eq!(result.error.and_then(|e| e.status()), Some(500));
        assert!(result.is_stale);
    }

    #[tokio::test]
    async fn test_invalidation_during_flight_last_request_wins() {
        let client = QueryClient::new();
        let script = Scripted::default();
        let first_reply = script.push();
        let second_reply = script.push();
        let obs = client.observe(invoices(1), true, script.fetcher());

        let first = obs.fetch();
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(obs.snapshot().is_pending);

        client.invalidate(&KeyPattern::lists(Resource::Invoices));

        let second = obs.fetch();
        tokio::pin!(second);
        assert!(futures::poll!(&mut second).is_pending());

        second_reply.send(Ok(2)).unwrap();
        assert_eq!(second.await.data.as_deref(), Some(&2));

        // The older response arrives last and must not overwrite the newer one
        first_reply.send(Ok(1)).unwrap();
        assert_eq!(first.await.data.as_deref(), Some(&2));
        assert_eq!(obs.snapshot().data.as_deref(), Some(&2));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn test_teardown_discards_result() {
        let client = QueryClient::new();
        let script = Scripted::default();
        let reply = script.push();

        let obs = client.observe(invoices(1), true, script.fetcher());
        {
            let fetch = obs.fetch();
            tokio::pin!(fetch);
            assert!(futures::poll!(&mut fetch).is_pending());
        }
        drop(obs);
        // The request went away with its last observer
        assert!(reply.send(Ok(1)).is_err());

        let later = client.observe(invoices(1), false, script.fetcher());
        assert!(later.snapshot().data.is_none());
        assert!(!later.snapshot().is_pending);
    }

    #[tokio::test]
    async fn test_remaining_observer_still_receives_result() {
        let client = QueryClient::new();
        let script = Scripted::default();
        let reply = script.push();

        let leaving = client.observe(invoices(1), true, script.fetcher());
        let staying = client.observe(invoices(1), true, script.fetcher());
        {
            let fetch = leaving.fetch();
            tokio::pin!(fetch);
            assert!(futures::poll!(&mut fetch).is_pending());
        }
        drop(leaving);

        reply.send(Ok(3)).unwrap();
        assert_eq!(staying.fetch().await.data.as_deref(), Some(&3));
        assert_eq!(script.calls(), 1);
    }

    fn tracked(client: &QueryClient) -> usize {
        lock(&client.state).cache.len()
    }

    #[test]
    fn test_fetcher_may_use_the_client() {
        let client = QueryClient::new();
        let key = invoices(1);
        let inner = client.clone();
        let own_key = key.clone();
        let obs = client.observe(key, true, move || {
            let stale = inner.is_stale(&own_key);
            let pending = inner.snapshot::<i32>(&own_key).is_pending;
            async move { Ok::<_, ApiError>(i32::from(stale) + i32::from(pending) * 10) }
        });

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let result = futures::executor::block_on(obs.fetch());
            tx.send(result.data.as_deref().copied()).ok();
        });
        let data = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(data, Some(10));
    }

    #[tokio::test]
    async fn test_dropped_observers_do_not_accumulate() {
        let client = QueryClient::new();
        let script = Scripted::default();
        for page in 0..500 {
            let obs = client.observe(invoices(page), page % 5 == 0, script.fetcher());
            if obs.is_enabled() {
                script.push().send(Ok(0)).unwrap();
                obs.fetch().await;
            }
        }
        assert_eq!(script.calls(), 100);
        assert!(tracked(&client) <= MAX_IDLE_ENTRIES);
        assert!(lock(&client.state).in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_data_outlives_its_observer() {
        let client = QueryClient::new();
        let script = Scripted::default();
        script.push().send(Ok(8)).unwrap();

        let first = client.observe(invoices(1), true, script.fetcher());
        first.fetch().await;
        drop(first);
        let empty = client.observe(invoices(2), false, script.fetcher());
        drop(empty);
        assert_eq!(tracked(&client), 1);

        let again = client.observe(invoices(1), true, script.fetcher());
        assert_eq!(again.fetch().await.data.as_deref(), Some(&8));
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_mutation_marks_related_keys_stale() {
        let client = QueryClient::new();
        let script = Scripted::default();
        for n in 0..3 {
            script.push().send(Ok(n)).unwrap();
        }
        let page = QueryParams::new().with("page", 1);
        let products = client.observe(
            QueryKey::list(Resource::Products, &page),
            true,
            script.fetcher(),
        );
        let ledger = client.observe(
            QueryKey::owned(Resource::StockLedger, "p1", &page),
            true,
            script.fetcher(),
        );
        let invoices = client.observe(invoices(1), true, script.fetcher());
        products.fetch().await;
        ledger.fetch().await;
        invoices.fetch().await;

        let count = client.invalidate_mutation(Mutation::AdjustStock, Some("p1"));
        assert_eq!(count, 2);
        assert!(client.is_stale(products.key()));
        assert!(client.is_stale(ledger.key()));
        assert!(!client.is_stale(invoices.key()));
    }
}
