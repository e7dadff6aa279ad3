//! Synchronous cache store.
//!
//! [`QueryCache`] owns every snapshot and the bookkeeping that decides whether
//! a completed request may be applied. It has no knowledge of futures or the
//! network, so the ordering rules can be exercised directly:
//!
//! * each key has a request generation; only the latest issued request for a
//!   key may write its result (last request wins);
//! * invalidation marks entries stale and supersedes their in-flight request;
//! * a result that arrives after the last observer of its key went away is
//!   dropped instead of repopulating the entry;
//! * entries nobody observes are evicted when empty, and only a bounded
//!   number of them keep their data for the next view.

use crate::{
    cache::key::{KeyPattern, QueryKey},
    errors::ApiError,
};
use std::{any::Any, collections::HashMap, sync::Arc, time::Instant};
use tracing::{debug, trace};

/// Type-erased snapshot payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Proof that a request was issued for a key at a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Key the request was issued for
    pub key: QueryKey,
    /// Generation assigned when the request was issued
    pub generation: u64,
}

/// Why a completed request was not written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A newer request was issued or the key was invalidated meanwhile
    Superseded,
    /// Nobody observes the key any more
    Unobserved,
}

/// Outcome of [`QueryCache::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Result stored
    Applied,
    /// Result dropped
    Discarded(DiscardReason),
}

#[derive(Default)]
struct Entry {
    data: Option<Payload>,
    error: Option<ApiError>,
    stale: bool,
    pending: Option<u64>,
    observers: usize,
    updated_at: Option<Instant>,
    // Generation of the request that wrote `data`
    written: u64,
}

/// Read-only view of one entry.
#[derive(Clone)]
pub struct EntrySnapshot {
    /// Last successfully fetched payload
    pub data: Option<Payload>,
    /// Error of the most recent failed fetch
    pub error: Option<ApiError>,
    /// Entry must be re-fetched before it is trusted
    pub stale: bool,
    /// A request for the key is in flight
    pub pending: bool,
    /// When `data` was last written
    pub updated_at: Option<Instant>,
}

/// Keyed snapshot store.
#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
    // Never reset, so a ticket stays unique after its entry is evicted
    next_generation: u64,
}

impl QueryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers one more observer of `key`.
    pub fn add_observer(&mut self, key: &QueryKey) {
        self.entries.entry(key.clone()).or_default().observers += 1;
    }

    /// Unregisters an observer of `key` and returns how many remain.
    ///
    /// When the last observer leaves, the in-flight request (if any) is
    /// superseded so its result is discarded on arrival.
    pub fn remove_observer(&mut self, key: &QueryKey) -> usize {
        let Some(entry) = self.entries.get_mut(key) else {
            return 0;
        };
        entry.observers = entry.observers.saturating_sub(1);
        if entry.observers == 0 && entry.pending.take().is_some() {
            debug!(key = %key, "Last observer left; in-flight request will be discarded");
        }
        entry.observers
    }

    /// Current observer count for `key`.
    #[must_use]
    pub fn observers(&self, key: &QueryKey) -> usize {
        self.entries.get(key).map_or(0, |e| e.observers)
    }

    /// True when `key` has no usable snapshot: never fetched, stale, or last
    /// fetched with an error.
    #[must_use]
    pub fn needs_fetch(&self, key: &QueryKey) -> bool {
        self.entries
            .get(key)
            .is_none_or(|e| e.data.is_none() || e.stale)
    }

    /// Issues a new request generation for `key`, superseding any older one.
    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.entry(key.clone()).or_default().pending = Some(generation);
        trace!(key = %key, generation, "Fetch issued");
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    /// True while `ticket` is the request its key is waiting for.
    #[must_use]
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.entries
            .get(&ticket.key)
            .is_some_and(|e| e.pending == Some(ticket.generation))
    }

    /// Applies the result of the request identified by `ticket`, unless it was
    /// superseded or its key is no longer observed.
    ///
    /// A failed request keeps the previous payload and records the error.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Payload, ApiError>,
    ) -> Completion {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            return Completion::Discarded(DiscardReason::Unobserved);
        };

        if entry.pending != Some(ticket.generation) {
            debug!(key = %ticket.key, generation = ticket.generation, "Discarding superseded result");
            return Completion::Discarded(DiscardReason::Superseded);
        }
        entry.pending = None;

        if entry.observers == 0 {
            debug!(key = %ticket.key, "Discarding result for unobserved key");
            return Completion::Discarded(DiscardReason::Unobserved);
        }

        match result {
            Ok(payload) => {
                entry.data = Some(payload);
                entry.error = None;
                entry.stale = false;
                entry.updated_at = Some(Instant::now());
                entry.written = ticket.generation;
            }
            Err(e) => {
                debug!(key = %ticket.key, error = %e, "Fetch failed; keeping previous snapshot");
                entry.error = Some(e);
                entry.stale = true;
            }
        }
        Completion::Applied
    }

    /// Marks every entry matching `pattern` stale and supersedes its in-flight
    /// request. Returns the affected keys.
    pub fn invalidate(&mut self, pattern: &KeyPattern) -> Vec<QueryKey> {
        let mut hit = Vec::new();
        for (key, entry) in &mut self.entries {
            if pattern.matches(key) {
                entry.stale = true;
                entry.pending = None;
                hit.push(key.clone());
            }
        }
        hit
    }

    /// Marks a single key stale.
    pub fn invalidate_key(&mut self, key: &QueryKey) -> bool {
        self.entries.get_mut(key).is_some_and(|entry| {
            entry.stale = true;
            entry.pending = None;
            true
        })
    }

    /// Snapshot of `key`, `None` if it was never observed.
    #[must_use]
    pub fn lookup(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        self.entries.get(key).map(|e| EntrySnapshot {
            data: e.data.clone(),
            error: e.error.clone(),
            stale: e.stale,
            pending: e.pending.is_some(),
            updated_at: e.updated_at,
        })
    }

    /// True if `key` is tracked and marked stale.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.stale)
    }

    /// Drops unobserved entries that hold no data, then the least recently
    /// updated unobserved entries beyond `max_idle`. Returns how many were
    /// removed.
    pub fn evict_idle(&mut self, max_idle: usize) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.observers > 0 || e.pending.is_some() || e.data.is_some());

        let mut idle: Vec<(u64, QueryKey)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.observers == 0 && e.pending.is_none())
            .map(|(key, e)| (e.written, key.clone()))
            .collect();
        if idle.len() > max_idle {
            idle.sort_unstable_by_key(|(written, _)| *written);
            let excess = idle.len() - max_idle;
            for (_, key) in idle.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }

        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, remaining = self.entries.len(), "Evicted idle entries");
        }
        removed
    }
}
