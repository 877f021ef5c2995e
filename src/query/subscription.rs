// Query subscriptions.
// Reference-counted interest in a key; keeps its entry alive and reports changes.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

use super::cache::{CacheState, lock};
use super::clock::Clock;
use super::key::QueryKey;

/// Live interest in one query key. Dropping it unsubscribes.
pub struct Subscription {
    key: QueryKey,
    state: Weak<Mutex<CacheState>>,
    clock: Arc<dyn Clock>,
    changes: watch::Receiver<u64>,
}

impl Subscription {
    pub(crate) fn new(
        key: QueryKey,
        state: Weak<Mutex<CacheState>>,
        clock: Arc<dyn Clock>,
        changes: watch::Receiver<u64>,
    ) -> Self {
        Self {
            key,
            state,
            clock,
            changes,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Wait until the entry changes: a fetch starts or settles, the key is
    /// invalidated, or the cache is cleared. Returns `false` once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    /// Whether a change arrived since the last `changed()`.
    pub fn has_changed(&self) -> bool {
        self.changes.has_changed().unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state).release(&self.key, self.clock.now());
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
