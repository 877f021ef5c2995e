// Cache entries and the snapshots handed to callers.
// An entry tracks value, freshness, fetch state and invalidation for one key.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};

use tracing::warn;

use crate::error::ErrorInfo;

use super::clock::elapsed;
use super::key::QueryKey;

/// Default staleness window: data is stale as soon as it lands.
pub const DEFAULT_STALE_TIME: Duration = Duration::ZERO;

/// Default garbage-collection window for unobserved entries: 5 minutes.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Freshness policy for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long fetched data is served without refetching.
    pub stale_time: Duration,
    /// How long an entry with no subscribers is kept.
    pub gc_time: Duration,
}

impl QueryOptions {
    pub const fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time,
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME, DEFAULT_GC_TIME)
    }
}

/// Fetch lifecycle of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Fetching,
    Success,
    Error,
}

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type FetchOutcome = std::result::Result<AnyValue, ErrorInfo>;
pub(crate) type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

pub(crate) struct Entry {
    /// Unique per entry lifetime; a fetch only writes back to the entry it started on.
    pub id: u64,
    pub value: Option<AnyValue>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub status: QueryStatus,
    pub error: Option<ErrorInfo>,
    pub invalidated: bool,
    /// Bumped on every invalidation.
    pub epoch: u64,
    pub in_flight: Option<InFlight>,
    pub stale_time: Duration,
    pub gc_time: Duration,
    /// Whether `gc_time` came from a caller's options rather than cache defaults.
    pub gc_explicit: bool,
    /// Set while nobody subscribes to the key.
    pub idle_since: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(id: u64, options: QueryOptions, idle_since: Option<DateTime<Utc>>) -> Self {
        Self {
            id,
            value: None,
            fetched_at: None,
            status: QueryStatus::Idle,
            error: None,
            invalidated: false,
            epoch: 0,
            in_flight: None,
            stale_time: options.stale_time,
            gc_time: options.gc_time,
            gc_explicit: false,
            idle_since,
        }
    }

    /// Adopt the caller's staleness window. The first caller's GC window
    /// replaces the cache default; after that the longest one seen is kept.
    pub fn apply(&mut self, options: QueryOptions) {
        self.stale_time = options.stale_time;
        self.gc_time = if self.gc_explicit {
            self.gc_time.max(options.gc_time)
        } else {
            options.gc_time
        };
        self.gc_explicit = true;
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if self.value.is_none() || self.invalidated {
            return true;
        }
        match self.fetched_at {
            Some(at) => elapsed(now, at) > self.stale_time,
            None => true,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn needs_fetch(&self, now: DateTime<Utc>) -> bool {
        !self.is_fetching() && self.is_stale(now)
    }

    /// Whether garbage collection may drop this entry.
    pub fn is_collectable(&self, now: DateTime<Utc>) -> bool {
        !self.is_fetching()
            && self
                .idle_since
                .is_some_and(|since| elapsed(now, since) >= self.gc_time)
    }

    pub fn snapshot<T: Any + Send + Sync>(
        &self,
        key: &QueryKey,
        now: DateTime<Utc>,
    ) -> QuerySnapshot<T> {
        let value = self.value.clone().and_then(|value| match value.downcast::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%key, "cached value has a different type than requested");
                None
            }
        });
        QuerySnapshot {
            key: key.clone(),
            value,
            fetched_at: self.fetched_at,
            status: self.status,
            error: self.error.clone(),
            is_stale: self.is_stale(now),
        }
    }
}

/// Point-in-time view of a cache entry.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    pub key: QueryKey,
    /// Last successfully fetched value; kept across later failures.
    pub value: Option<Arc<T>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub status: QueryStatus,
    pub error: Option<ErrorInfo>,
    pub is_stale: bool,
}

impl<T> QuerySnapshot<T> {
    pub fn data(&self) -> Option<&T> {
        self.value.as_deref()
    }

    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Fetching
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            fetched_at: self.fetched_at,
            status: self.status,
            error: self.error.clone(),
            is_stale: self.is_stale,
        }
    }
}
