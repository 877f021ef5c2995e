// Query cache.
// Keyed store of fetched values with request de-duplication, invalidation and garbage collection.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ErrorInfo, FoodDashError, Result};

use super::clock::{Clock, SystemClock};
use super::entry::{
    AnyValue, Entry, FetchOutcome, InFlight, QueryOptions, QuerySnapshot, QueryStatus,
};
use super::key::QueryKey;
use super::subscription::Subscription;

/// Subscribers of one key and the channel that wakes them.
pub(crate) struct Observers {
    count: usize,
    notify: watch::Sender<u64>,
}

#[derive(Default)]
pub(crate) struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    /// Kept apart from `entries` so subscriber counts survive `clear()`.
    observers: HashMap<QueryKey, Observers>,
    next_id: u64,
}

impl CacheState {
    fn entry_mut(
        &mut self,
        key: &QueryKey,
        options: QueryOptions,
        now: DateTime<Utc>,
    ) -> &mut Entry {
        let idle_since = (!self.observers.contains_key(key)).then_some(now);
        let next_id = &mut self.next_id;
        self.entries.entry(key.clone()).or_insert_with(|| {
            *next_id += 1;
            debug!(%key, "cache entry created");
            Entry::new(*next_id, options, idle_since)
        })
    }

    fn notify(&self, key: &QueryKey) {
        if let Some(observers) = self.observers.get(key) {
            observers.notify.send_modify(|version| *version = version.wrapping_add(1));
        }
    }

    /// Drop entries nobody has observed for their GC window.
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let collect = entry.is_collectable(now);
            if collect {
                debug!(%key, "cache entry garbage collected");
            }
            !collect
        });
        before - self.entries.len()
    }

    pub(crate) fn release(&mut self, key: &QueryKey, now: DateTime<Utc>) {
        let Some(observers) = self.observers.get_mut(key) else {
            return;
        };
        observers.count = observers.count.saturating_sub(1);
        if observers.count == 0 {
            self.observers.remove(key);
            if let Some(entry) = self.entries.get_mut(key) {
                entry.idle_since = Some(now);
            }
        }
    }

    /// Record the result of a fetch on the entry it was started for.
    fn settle(
        &mut self,
        key: &QueryKey,
        id: u64,
        epoch: u64,
        outcome: &FetchOutcome,
        now: DateTime<Utc>,
    ) {
        let Some(entry) = self.entries.get_mut(key).filter(|entry| entry.id == id) else {
            debug!(%key, "discarding fetch result for a removed entry");
            return;
        };

        entry.in_flight = None;
        match outcome {
            Ok(value) => {
                entry.value = Some(Arc::clone(value));
                entry.fetched_at = Some(now);
                entry.status = QueryStatus::Success;
                entry.error = None;
                // An invalidation issued after this fetch started still stands.
                if entry.epoch == epoch {
                    entry.invalidated = false;
                } else {
                    debug!(%key, "entry invalidated during fetch, keeping it stale");
                }
            }
            Err(info) => {
                debug!(%key, error = %info, "fetch failed");
                entry.status = QueryStatus::Error;
                entry.error = Some(info.clone());
            }
        }
        // Unobserved entries get a full GC window once their data lands.
        if entry.idle_since.is_some() {
            entry.idle_since = Some(now);
        }

        self.notify(key);
    }
}

pub(crate) fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client-side request cache.
///
/// Cloning yields another handle to the same store. Reads return what is
/// cached right away and start at most one fetch per key; callers that need
/// the value itself use [`QueryCache::fetch`].
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    clock: Arc<dyn Clock>,
    defaults: QueryOptions,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            clock: Arc::new(clock),
            defaults: QueryOptions::default(),
        }
    }

    /// Options used for entries created without explicit ones, such as by `subscribe`.
    pub fn with_defaults(mut self, defaults: QueryOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> QueryOptions {
        self.defaults
    }

    /// Return the current entry for `key` and start a fetch if it is absent,
    /// invalidated or older than `options.stale_time` and none is running.
    ///
    /// A started fetch is spawned on the current Tokio runtime when there is
    /// one; otherwise it runs once something awaits it through `fetch`.
    pub fn read<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> QuerySnapshot<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = self.clock.now();
        let mut state = lock(&self.state);
        state.sweep(now);

        let entry = state.entry_mut(key, options, now);
        entry.apply(options);
        let started = if entry.needs_fetch(now) {
            Some(self.begin_fetch(entry, key, fetcher))
        } else {
            if entry.is_fetching() {
                debug!(%key, "fetch already in flight");
            }
            None
        };
        let snapshot = entry.snapshot(key, now);

        if let Some(fetch) = started {
            state.notify(key);
            drop(state);
            drive(fetch);
        }
        snapshot
    }

    /// Resolve the value for `key`: the cached one while fresh, otherwise the
    /// result of the in-flight fetch or of a new one. Concurrent callers share
    /// a single fetch and receive the same `Arc`.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = self.clock.now();
        let pending = {
            let mut state = lock(&self.state);
            state.sweep(now);

            let entry = state.entry_mut(key, options, now);
            entry.apply(options);
            if !entry.is_stale(now) {
                if let Some(value) = entry.value.clone() {
                    return downcast(key, value);
                }
            }

            match entry.in_flight.clone() {
                Some(fetch) => {
                    debug!(%key, "joining in-flight fetch");
                    fetch
                }
                None => {
                    let fetch = self.begin_fetch(entry, key, fetcher);
                    state.notify(key);
                    drive(fetch.clone());
                    fetch
                }
            }
        };

        match pending.await {
            Ok(value) => downcast(key, value),
            Err(info) => Err(FoodDashError::Query(info)),
        }
    }

    fn begin_fetch<T, F, Fut>(&self, entry: &mut Entry, key: &QueryKey, fetcher: F) -> InFlight
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        debug!(%key, "starting fetch");
        let id = entry.id;
        let epoch = entry.epoch;
        let state = Arc::downgrade(&self.state);
        let clock = Arc::clone(&self.clock);
        let key = key.clone();

        let fetch = async move {
            let outcome: FetchOutcome = match fetcher().await {
                Ok(value) => Ok(Arc::new(value) as AnyValue),
                Err(err) => Err(ErrorInfo::from(&err)),
            };
            if let Some(state) = state.upgrade() {
                lock(&state).settle(&key, id, epoch, &outcome, clock.now());
            }
            outcome
        }
        .boxed()
        .shared();

        entry.in_flight = Some(fetch.clone());
        entry.status = QueryStatus::Fetching;
        fetch
    }

    /// Mark every entry whose key starts with `key` as stale, keeping its value
    /// on display. Returns how many entries matched.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        let mut state = lock(&self.state);
        let mut matched = Vec::new();
        for (entry_key, entry) in state.entries.iter_mut() {
            if entry_key.starts_with(key) {
                entry.invalidated = true;
                entry.epoch += 1;
                matched.push(entry_key.clone());
            }
        }
        for entry_key in &matched {
            state.notify(entry_key);
        }

        debug!(%key, count = matched.len(), "invalidated queries");
        matched.len()
    }

    /// Drop every entry. Fetches still running resolve, but their results
    /// are discarded.
    pub fn clear(&self) {
        let removed = {
            let mut state = lock(&self.state);
            let removed = std::mem::take(&mut state.entries);
            for observers in state.observers.values() {
                observers
                    .notify
                    .send_modify(|version| *version = version.wrapping_add(1));
            }
            removed
        };
        debug!(count = removed.len(), "cache cleared");
    }

    /// Register interest in `key`. The entry is kept for as long as the
    /// returned subscription lives.
    pub fn subscribe(&self, key: &QueryKey) -> Subscription {
        let now = self.clock.now();
        let mut state = lock(&self.state);
        state.sweep(now);

        state.entry_mut(key, self.defaults, now).idle_since = None;
        let observers = state
            .observers
            .entry(key.clone())
            .or_insert_with(|| Observers {
                count: 0,
                notify: watch::channel(0).0,
            });
        observers.count += 1;
        let changes = observers.notify.subscribe();

        Subscription::new(
            key.clone(),
            Arc::downgrade(&self.state),
            Arc::clone(&self.clock),
            changes,
        )
    }

    /// Explicit form of dropping the subscription.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        lock(&self.state)
            .observers
            .get(key)
            .map_or(0, |observers| observers.count)
    }

    /// Inspect an entry without triggering a fetch.
    pub fn peek<T: Any + Send + Sync>(&self, key: &QueryKey) -> Option<QuerySnapshot<T>> {
        let now = self.clock.now();
        let mut state = lock(&self.state);
        state.sweep(now);
        state.entries.get(key).map(|entry| entry.snapshot(key, now))
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        let mut state = lock(&self.state);
        state.sweep(self.clock.now());
        state.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        let mut state = lock(&self.state);
        state.sweep(self.clock.now());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purge unobserved entries past their GC window. Returns how many were dropped.
    pub fn collect_garbage(&self) -> usize {
        lock(&self.state).sweep(self.clock.now())
    }

    /// Sweep on a fixed period until every handle to this cache is gone.
    pub fn spawn_collector(&self, period: Duration) -> JoinHandle<()> {
        let state = Arc::downgrade(&self.state);
        let clock = Arc::clone(&self.clock);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                let purged = lock(&state).sweep(clock.now());
                if purged > 0 {
                    debug!(purged, "garbage collector swept entries");
                }
            }
        })
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        lock(&self.state).entries.len()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("observed_keys", &state.observers.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Run a started fetch in the background so it completes without an awaiting caller.
fn drive(fetch: InFlight) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fetch.map(|_| ()));
        }
        Err(_) => debug!("no Tokio runtime, fetch will run when awaited"),
    }
}

fn downcast<T: Any + Send + Sync>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| {
        warn!(%key, "cached value has a different type than requested");
        FoodDashError::Other(format!("cached value for {} has an unexpected type", key))
    })
}
