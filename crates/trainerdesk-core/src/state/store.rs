use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::cache::TtlPolicy;
use crate::models::ResourceKind;

use super::{reduce, Action, AppState};

/// Owned handle to the aggregate state.
///
/// Every transition runs `reduce` inside the watch channel's write lock, so
/// dispatches from any number of tasks are applied one at a time and each
/// subscriber sees whole transitions only. Clone is cheap and every clone
/// refers to the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    tx: watch::Sender<AppState>,
    generation: AtomicU64,
}

impl Store {
    pub fn new(policy: TtlPolicy) -> Self {
        let (tx, _rx) = watch::channel(AppState::new(policy));
        Self {
            inner: Arc::new(StoreInner {
                tx,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn dispatch(&self, action: Action) {
        trace!(action = action.name(), "dispatch");
        self.inner.tx.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action, Utc::now());
        });
    }

    /// Dispatch unless `token` has been cancelled.
    ///
    /// The cancellation check happens under the same lock as the transition,
    /// so a cancelled refresh can never write. Returns whether the action was
    /// applied.
    pub fn dispatch_unless_cancelled(&self, token: &CancellationToken, action: Action) -> bool {
        self.inner.tx.send_if_modified(|state| {
            if token.is_cancelled() {
                trace!(action = action.name(), "dropped action from cancelled refresh");
                return false;
            }
            let current = std::mem::take(state);
            *state = reduce(current, action, Utc::now());
            true
        })
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.inner.tx.borrow().clone()
    }

    /// Read from the current state without cloning it
    pub fn read<T>(&self, f: impl FnOnce(&AppState) -> T) -> T {
        f(&self.inner.tx.borrow())
    }

    /// Receiver notified after every applied transition
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.tx.subscribe()
    }

    pub fn is_stale(&self, kind: ResourceKind) -> bool {
        self.read(|state| state.is_stale(kind))
    }

    /// Next fetch generation; strictly increasing for the store's lifetime
    pub fn next_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(TtlPolicy::default())
    }
}
