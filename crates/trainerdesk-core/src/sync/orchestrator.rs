//! Bulk refresh of the cached resources.
//!
//! A refresh selects the kinds that need fetching (stale ones, or all of
//! them when forced), resolves the role first when that fact is stale, fans
//! the remaining requests out concurrently, and folds the results into the
//! store in canonical kind order. Each refresh owns a `CancellationToken`;
//! every action it dispatches is checked against that token inside the
//! store's write lock, so nothing from a cancelled or timed-out refresh can
//! land in state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::SessionData;
use crate::models::{PaymentSettings, ResourceKind, ResourcePayload, Role};
use crate::remote::{FetchScope, RemoteService};
use crate::state::{Action, LoadingConcern, Store};
use crate::views::derive_metrics;

use super::{FetchFailure, SyncError};

/// Upper bound for one refresh, role check included.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// How a refresh ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// An identical refresh for the same identity is already running
    AlreadyInFlight,
    /// Superseded or torn down before it finished; nothing was written
    Cancelled,
    /// Gave up after the refresh timeout; flags reset, data kept
    TimedOut,
}

impl RefreshOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RefreshOutcome::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    /// Kinds requested from the remote service and folded into state
    pub fetched: Vec<ResourceKind>,
    /// Kinds left alone because their cache slot was still fresh
    pub skipped: Vec<ResourceKind>,
    pub role: Role,
    /// Whether the role had to be resolved first
    pub role_checked: bool,
    pub elapsed: Duration,
}

struct InFlight {
    id: u64,
    owner_id: String,
    kinds: Vec<ResourceKind>,
    token: CancellationToken,
}

/// Removes its flight from the registry when the refresh returns or its
/// future is dropped, then wakes anyone waiting for flights to settle.
struct FlightGuard<'a> {
    registry: &'a Mutex<Vec<InFlight>>,
    settled: &'a watch::Sender<u64>,
    id: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.registry).retain(|flight| flight.id != self.id);
        self.settled.send_modify(|count| *count += 1);
    }
}

fn lock(registry: &Mutex<Vec<InFlight>>) -> MutexGuard<'_, Vec<InFlight>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_running(flights: &[InFlight], owner_id: &str, kinds: &[ResourceKind]) -> bool {
    flights.iter().any(|flight| {
        flight.owner_id == owner_id && flight.kinds == kinds && !flight.token.is_cancelled()
    })
}

fn bulk_kinds() -> Vec<ResourceKind> {
    ResourceKind::ALL
        .into_iter()
        .filter(|&kind| kind != ResourceKind::RoleStatus)
        .collect()
}

fn normalized(kinds: &[ResourceKind]) -> Vec<ResourceKind> {
    let mut kinds = kinds.to_vec();
    kinds.sort();
    kinds.dedup();
    kinds
}

pub struct Orchestrator<R> {
    remote: Arc<R>,
    store: Store,
    timeout: Duration,
    flights: Mutex<Vec<InFlight>>,
    /// Bumped every time a flight leaves the registry
    settled: watch::Sender<u64>,
    next_flight: AtomicU64,
}

impl<R> Orchestrator<R> {
    pub fn new(remote: Arc<R>, store: Store, timeout: Duration) -> Self {
        Self {
            remote,
            store,
            timeout,
            flights: Mutex::new(Vec::new()),
            settled: watch::Sender::new(0),
            next_flight: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of refreshes currently running
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }

    /// Cancel every running refresh and reset the loading flags they own.
    /// Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let flights = lock(&self.flights);
            for flight in flights.iter() {
                flight.token.cancel();
            }
            flights.len()
        };
        if cancelled > 0 {
            debug!(count = cancelled, "Cancelled in-flight refreshes");
            self.reset_loading();
        }
        cancelled
    }

    fn reset_loading(&self) {
        self.store
            .dispatch(Action::SetLoading(LoadingConcern::RoleCheck, false));
        self.store
            .dispatch(Action::SetLoading(LoadingConcern::BulkData, false));
    }
}

impl<R: RemoteService> Orchestrator<R> {
    /// Refresh every resource kind of the current role.
    pub async fn refresh_all(&self, force: bool) -> Result<RefreshOutcome, SyncError> {
        self.refresh_kinds(&bulk_kinds(), force).await
    }

    /// `refresh_all`, but an identical refresh already running is waited
    /// out instead of reported, so this one always gets to run.
    pub async fn refresh_all_queued(&self, force: bool) -> Result<RefreshOutcome, SyncError> {
        self.refresh_kinds_queued(&bulk_kinds(), force).await
    }

    pub async fn refresh_kinds_queued(
        &self,
        kinds: &[ResourceKind],
        force: bool,
    ) -> Result<RefreshOutcome, SyncError> {
        loop {
            match self.refresh_kinds(kinds, force).await? {
                RefreshOutcome::AlreadyInFlight => {
                    debug!("Waiting for the running refresh to settle");
                    self.wait_settled(kinds).await;
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Resolves once no live refresh of `kinds` is running for the current
    /// identity.
    async fn wait_settled(&self, kinds: &[ResourceKind]) {
        let owner_id = match self.store.read(|state| state.user_id().map(str::to_string)) {
            Some(owner_id) => owner_id,
            None => return,
        };
        let kinds = normalized(kinds);
        let mut rx = self.settled.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait
        let _ = rx
            .wait_for(|_| !is_running(&lock(&self.flights), &owner_id, &kinds))
            .await;
    }

    /// Refresh `kinds`, restricted to what the current role may see.
    ///
    /// Including `RoleStatus` in a forced refresh re-resolves the role even
    /// when its slot is still fresh.
    pub async fn refresh_kinds(
        &self,
        kinds: &[ResourceKind],
        force: bool,
    ) -> Result<RefreshOutcome, SyncError> {
        let session = match self.store.read(|state| state.session.clone()) {
            Some(session) => session,
            None => return Err(SyncError::NoSession),
        };

        let kinds = normalized(kinds);

        let (id, token) = match self.begin(&session.user_id, &kinds) {
            Some(flight) => flight,
            None => {
                debug!(user = %session.user_id, "Refresh already in flight");
                return Ok(RefreshOutcome::AlreadyInFlight);
            }
        };
        let _guard = FlightGuard {
            registry: &self.flights,
            settled: &self.settled,
            id,
        };

        let started = Instant::now();
        info!(user = %session.user_id, force, kinds = kinds.len(), "Starting refresh");

        let run = self.run(&session, &kinds, force, &token);
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(user = %session.user_id, "Refresh cancelled");
                Ok(RefreshOutcome::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, run) => match result {
                Ok(Ok(mut report)) => {
                    report.elapsed = started.elapsed();
                    info!(
                        fetched = report.fetched.len(),
                        skipped = report.skipped.len(),
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Refresh complete"
                    );
                    Ok(RefreshOutcome::Completed(report))
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Refresh failed");
                    Err(e)
                }
                Err(_) => {
                    warn!(timeout_ms = self.timeout.as_millis() as u64, "Refresh timed out");
                    token.cancel();
                    self.reset_loading();
                    Ok(RefreshOutcome::TimedOut)
                }
            },
        }
    }

    /// Register a refresh. Returns `None` when an identical one is running
    /// for the same identity; refreshes for any other identity are cancelled.
    fn begin(&self, owner_id: &str, kinds: &[ResourceKind]) -> Option<(u64, CancellationToken)> {
        let mut flights = lock(&self.flights);

        if is_running(&flights, owner_id, kinds) {
            return None;
        }

        let mut superseded = false;
        flights.retain(|flight| {
            if flight.owner_id == owner_id {
                true
            } else {
                flight.token.cancel();
                superseded = true;
                false
            }
        });

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        flights.push(InFlight {
            id,
            owner_id: owner_id.to_string(),
            kinds: kinds.to_vec(),
            token: token.clone(),
        });
        drop(flights);

        if superseded {
            debug!(user = owner_id, "Superseded refresh for previous identity");
            self.reset_loading();
        }
        Some((id, token))
    }

    async fn run(
        &self,
        session: &SessionData,
        kinds: &[ResourceKind],
        force: bool,
        token: &CancellationToken,
    ) -> Result<RefreshReport, SyncError> {
        let store = &self.store;
        store.dispatch_unless_cancelled(token, Action::SetError(None));

        // Phase 1: the role scopes everything else
        let now = Utc::now();
        let known_role = store.read(|state| {
            if state.role_needs_check_at(now) {
                None
            } else {
                state.role
            }
        });
        let force_role = force && kinds.contains(&ResourceKind::RoleStatus);
        let (role, role_checked) = match known_role {
            Some(role) if !force_role => (role, false),
            _ => (self.check_role(session, token).await?, true),
        };

        // Phase 2: the role's resources
        let now = Utc::now();
        let wanted = kinds
            .iter()
            .copied()
            .filter(|kind| role.resource_set().contains(kind));
        let (selected, skipped): (Vec<ResourceKind>, Vec<ResourceKind>) = if force {
            (wanted.collect(), Vec::new())
        } else {
            store.read(|state| wanted.partition(|&kind| state.is_stale_at(kind, now)))
        };

        let mut report = RefreshReport {
            fetched: Vec::new(),
            skipped,
            role,
            role_checked,
            elapsed: Duration::ZERO,
        };
        if selected.is_empty() {
            debug!(skipped = report.skipped.len(), "Everything fresh, nothing to fetch");
            return Ok(report);
        }

        store.dispatch_unless_cancelled(token, Action::SetLoading(LoadingConcern::BulkData, true));

        let scope = FetchScope::new(session, role);
        let requests = selected.iter().map(|&kind| {
            let generation = store.next_generation();
            let scope = &scope;
            async move { (kind, generation, self.remote.fetch(kind, scope).await) }
        });
        let results = join_all(requests).await;

        let mut failures = Vec::new();
        for (kind, generation, result) in results {
            let payload = match result {
                Ok(payload) => {
                    debug!(kind = %kind, count = payload.len(), "Fetched");
                    payload
                }
                Err(e) if e.is_not_found() && kind == ResourceKind::PaymentSettings => {
                    debug!(kind = %kind, "Not found, using defaults");
                    PaymentSettings::default().into()
                }
                Err(e) if e.is_not_found() && kind == ResourceKind::PaymentMetrics => {
                    // Earlier kinds in fold order are already in state
                    debug!(kind = %kind, "Not found, deriving locally");
                    let metrics = store.read(|state| derive_metrics(&state.data, Utc::now()));
                    ResourcePayload::from(metrics)
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Fetch failed");
                    failures.push(FetchFailure { kind, error: e });
                    continue;
                }
            };
            store.dispatch_unless_cancelled(
                token,
                Action::SetResource {
                    payload,
                    generation: Some(generation),
                },
            );
            report.fetched.push(kind);
        }

        store.dispatch_unless_cancelled(token, Action::SetLoading(LoadingConcern::BulkData, false));

        if failures.is_empty() {
            Ok(report)
        } else {
            let err = SyncError::Fetch {
                failures,
                fetched: report.fetched,
            };
            store.dispatch_unless_cancelled(token, Action::SetError(Some(err.user_message())));
            Err(err)
        }
    }

    async fn check_role(
        &self,
        session: &SessionData,
        token: &CancellationToken,
    ) -> Result<Role, SyncError> {
        let store = &self.store;
        store.dispatch_unless_cancelled(token, Action::SetLoading(LoadingConcern::RoleCheck, true));
        let result = self.remote.resolve_role(session).await;
        store.dispatch_unless_cancelled(token, Action::SetLoading(LoadingConcern::RoleCheck, false));

        match result {
            Ok(role) => {
                debug!(user = %session.user_id, role = %role, "Role resolved");
                store.dispatch_unless_cancelled(token, Action::SetRoleStatus(role));
                Ok(role)
            }
            Err(e) => {
                let err = SyncError::RoleCheck(e);
                store.dispatch_unless_cancelled(token, Action::SetError(Some(err.user_message())));
                Err(err)
            }
        }
    }
}

impl<R> Drop for Orchestrator<R> {
    fn drop(&mut self) {
        for flight in lock(&self.flights).iter() {
            flight.token.cancel();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
