//! Keyed cache of in-flight and completed resource fetches.
//!
//! One entry per unique key tuple. Concurrent reads of the same key share a
//! single request; mutations declare which keys became stale; stale entries
//! with active subscribers refetch immediately while continuing to serve
//! their last data, so paginating views never flicker back to a spinner.
//!
//! Responses are not guaranteed to arrive in issue order, so every request
//! carries a sequence number and only the most recently issued request for
//! a key may write the entry. Late results from superseded requests still
//! answer the callers that awaited them, but never touch the cache. The
//! same sequence numbers order invalidations: a request issued before an
//! invalidation can never clear the staleness it caused.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::http::{ApiError, BoxFuture};

use super::key::QueryKey;

/// Immediate retries applied to a failed read before the entry settles in
/// `Error`.
pub const DEFAULT_RETRIES: u32 = 1;

/// Idle period after which an unsubscribed entry is garbage-collected.
pub const DEFAULT_GC_IDLE: Duration = Duration::from_secs(300);

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Created but never fetched.
    Idle,
    /// A request is in flight.
    Pending,
    Success,
    Error,
}

/// Observable state of one entry, handed to subscribers and pollers.
#[derive(Clone)]
pub struct QuerySnapshot {
    pub key: QueryKey,
    pub status: QueryStatus,
    /// Last known data; present during a stale-while-revalidate refetch.
    pub data: Option<Arc<Value>>,
    pub error: Option<ApiError>,
    pub is_stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
    /// Deserializes the held data, if any.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        let data = self.data.as_ref()?;
        serde_json::from_value(Value::clone(data)).ok()
    }
}

type FetchOutcome = Result<Arc<Value>, ApiError>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;
type Subscriber = Arc<dyn Fn(QuerySnapshot) + Send + Sync>;

/// Handle returned by [`QueryCache::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionId {
    key: QueryKey,
    id: u64,
}

struct Entry {
    status: QueryStatus,
    data: Option<Arc<Value>>,
    error: Option<ApiError>,
    stale: bool,
    updated_at: Option<DateTime<Utc>>,
    last_used: Instant,
    /// Sequence number of the most recently issued request for this key.
    last_seq: u64,
    /// Highest request sequence tainted by an invalidation; only requests
    /// issued after it may clear staleness.
    invalidated_seq: u64,
    inflight: Option<broadcast::Sender<FetchOutcome>>,
    /// Fetcher from the most recent fetch, kept for invalidation refetches.
    fetcher: Option<Fetcher>,
    subscribers: HashMap<u64, Subscriber>,
}

impl Entry {
    fn new() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            stale: false,
            updated_at: None,
            last_used: Instant::now(),
            last_seq: 0,
            invalidated_seq: 0,
            inflight: None,
            fetcher: None,
            subscribers: HashMap::new(),
        }
    }

    fn snapshot(&self, key: &QueryKey) -> QuerySnapshot {
        QuerySnapshot {
            key: key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_stale: self.stale,
            updated_at: self.updated_at,
        }
    }
}

struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    next_sub: u64,
    next_seq: u64,
}

struct CacheInner {
    state: Mutex<CacheState>,
    retries: u32,
    gc_idle: Duration,
}

/// Process-wide query cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_RETRIES, DEFAULT_GC_IDLE)
    }

    /// Cache with explicit retry and garbage-collection policy.
    pub fn with_settings(retries: u32, gc_idle: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    next_sub: 0,
                    next_seq: 0,
                }),
                retries,
                gc_idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The lock is only ever held for short, non-awaiting sections.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the value for `key`, deduplicating against any in-flight
    /// request and caching the result.
    ///
    /// The fetcher is retained so later invalidations can refetch for
    /// active subscribers. A settled `Error` entry is served as-is until an
    /// invalidation or [`refetch`](Self::refetch) clears it.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<Value>, ApiError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || Box::pin(fetcher()));
        self.fetch_with(key, fetcher).await
    }

    /// Typed variant of [`fetch`](Self::fetch).
    pub async fn fetch_as<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let data = self.fetch(key, fetcher).await?;
        serde_json::from_value(Value::clone(&data))
            .map_err(|err| ApiError::malformed("malformed cached value", err))
    }

    async fn fetch_with(&self, key: QueryKey, fetcher: Fetcher) -> FetchOutcome {
        let mut rx = {
            let mut state = self.lock();
            self.sweep_locked(&mut state);

            let entry = state.entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.last_used = Instant::now();
            entry.fetcher = Some(fetcher.clone());

            if !entry.stale {
                if entry.status == QueryStatus::Success {
                    if let Some(data) = &entry.data {
                        return Ok(data.clone());
                    }
                }
                if entry.status == QueryStatus::Error {
                    if let Some(error) = &entry.error {
                        return Err(error.clone());
                    }
                }
            }

            // An in-flight request issued before the last invalidation
            // would resolve to pre-mutation data; supersede it instead of
            // joining.
            let joined = if entry.last_seq > entry.invalidated_seq {
                entry.inflight.as_ref().map(|tx| tx.subscribe())
            } else {
                None
            };
            match joined {
                Some(rx) => rx,
                None => self.begin_fetch(&mut state, &key, fetcher),
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // The request task always broadcasts before dropping the
            // sender, so this only fires if the runtime is torn down.
            Err(_) => Err(ApiError::Network("request task was dropped".to_string())),
        }
    }

    /// Issues a new request for `key`, superseding any in-flight one.
    ///
    /// The result is applied to the entry (unless superseded again) and the
    /// request's own outcome is returned to the awaiters of this call.
    fn begin_fetch(
        &self,
        state: &mut CacheState,
        key: &QueryKey,
        fetcher: Fetcher,
    ) -> broadcast::Receiver<FetchOutcome> {
        state.next_seq += 1;
        let seq = state.next_seq;

        let entry = state.entries.entry(key.clone()).or_insert_with(Entry::new);
        let (tx, rx) = broadcast::channel(1);
        entry.inflight = Some(tx.clone());
        entry.last_seq = seq;
        // Keep data/error in place: subscribers render the previous state
        // until the refetch resolves.
        entry.status = QueryStatus::Pending;

        let cache = self.clone();
        let key = key.clone();
        let retries = self.inner.retries;
        // Spawned so an unmounted awaiter cannot cancel the shared update.
        tokio::spawn(async move {
            let mut outcome = fetcher().await;
            let mut attempt = 0;
            while outcome.is_err() && attempt < retries {
                attempt += 1;
                tracing::debug!(key = %key, attempt, "read failed, retrying");
                outcome = fetcher().await;
            }
            cache.settle(&key, seq, outcome, tx);
        });

        rx
    }

    fn settle(
        &self,
        key: &QueryKey,
        seq: u64,
        outcome: Result<Value, ApiError>,
        tx: broadcast::Sender<FetchOutcome>,
    ) {
        let shared: FetchOutcome = outcome.map(Arc::new);
        let mut notifications: Vec<(Subscriber, QuerySnapshot)> = Vec::new();

        {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get_mut(key) {
                if entry.last_seq != seq {
                    tracing::debug!(key = %key, "discarding result of superseded request");
                } else {
                    entry.inflight = None;
                    entry.updated_at = Some(Utc::now());
                    entry.last_used = Instant::now();
                    match &shared {
                        Ok(data) => {
                            entry.status = QueryStatus::Success;
                            entry.data = Some(data.clone());
                            entry.error = None;
                            // A request that raced an invalidation keeps
                            // the entry stale.
                            entry.stale = seq <= entry.invalidated_seq;
                        }
                        Err(error) => {
                            entry.status = QueryStatus::Error;
                            entry.error = Some(error.clone());
                        }
                    }
                    let snapshot = entry.snapshot(key);
                    for subscriber in entry.subscribers.values() {
                        notifications.push((subscriber.clone(), snapshot.clone()));
                    }
                }
            }
        }

        // Awaiters of this particular request always get its result, even
        // when the entry has moved on.
        let _ = tx.send(shared);

        // Callbacks run outside the lock.
        for (subscriber, snapshot) in notifications {
            subscriber(snapshot);
        }
    }

    /// Marks every entry matching `pattern` (exact key or prefix) stale.
    ///
    /// When called on a tokio runtime, entries with active subscribers
    /// refetch immediately with their stored fetcher; everything else
    /// (including every entry when no runtime is available) refetches on
    /// next access.
    pub fn invalidate(&self, pattern: &QueryKey) {
        let mut state = self.lock();

        let matching: Vec<QueryKey> = state
            .entries
            .keys()
            .filter(|key| key.starts_with(pattern))
            .cloned()
            .collect();

        let mut refetches: Vec<(QueryKey, Fetcher)> = Vec::new();
        for key in matching {
            if let Some(entry) = state.entries.get_mut(&key) {
                entry.stale = true;
                // Taints any request currently in flight, so its result
                // cannot clear the staleness recorded here.
                entry.invalidated_seq = entry.last_seq;
                tracing::debug!(key = %key, "invalidated");
                if !entry.subscribers.is_empty() {
                    if let Some(fetcher) = entry.fetcher.clone() {
                        refetches.push((key, fetcher));
                    }
                }
            }
        }

        if !refetches.is_empty() && tokio::runtime::Handle::try_current().is_ok() {
            for (key, fetcher) in refetches {
                let _joined = self.begin_fetch(&mut state, &key, fetcher);
            }
        }
    }

    /// Forces a new request for `key` using its stored fetcher, superseding
    /// any request already in flight.
    ///
    /// Returns `None` when the key was never fetched (there is nothing to
    /// refetch with).
    pub async fn refetch(&self, key: &QueryKey) -> Option<FetchOutcome> {
        let rx = {
            let mut state = self.lock();
            let fetcher = state.entries.get(key).and_then(|entry| entry.fetcher.clone())?;
            self.begin_fetch(&mut state, key, fetcher)
        };
        let mut rx = rx;
        rx.recv().await.ok()
    }

    /// Registers a callback invoked with a snapshot after every applied
    /// state change of `key`.
    pub fn subscribe(
        &self,
        key: &QueryKey,
        callback: impl Fn(QuerySnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut state = self.lock();
        state.next_sub += 1;
        let id = state.next_sub;

        let entry = state.entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.last_used = Instant::now();
        entry.subscribers.insert(id, Arc::new(callback));

        SubscriptionId {
            key: key.clone(),
            id,
        }
    }

    /// Drops a subscription. The entry itself stays until garbage
    /// collection; other subscribers are unaffected.
    pub fn unsubscribe(&self, subscription: &SubscriptionId) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(&subscription.key) {
            entry.subscribers.remove(&subscription.id);
            entry.last_used = Instant::now();
        }
    }

    /// Current state of `key`, if the cache holds an entry for it.
    pub fn snapshot(&self, key: &QueryKey) -> Option<QuerySnapshot> {
        let state = self.lock();
        state.entries.get(key).map(|entry| entry.snapshot(key))
    }

    /// Runs a mutation and, on success, invalidates every declared key
    /// pattern. This is the only consistency mechanism between writes and
    /// cached reads: each mutation site declares what became stale.
    pub async fn mutate<T>(
        &self,
        operation: impl Future<Output = Result<T, ApiError>>,
        invalidates: &[QueryKey],
    ) -> Result<T, ApiError> {
        let output = operation.await?;
        for pattern in invalidates {
            self.invalidate(pattern);
        }
        Ok(output)
    }

    /// Drops entries that have no subscribers, no in-flight request, and
    /// have been idle past the configured period.
    pub fn sweep(&self) {
        let mut state = self.lock();
        self.sweep_locked(&mut state);
    }

    fn sweep_locked(&self, state: &mut CacheState) {
        let idle = self.inner.gc_idle;
        state.entries.retain(|_, entry| {
            !entry.subscribers.is_empty()
                || entry.inflight.is_some()
                || entry.last_used.elapsed() < idle
        });
    }

    /// Number of live entries, for diagnostics.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
