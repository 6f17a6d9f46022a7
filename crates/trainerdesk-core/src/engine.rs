//! The object a front end owns.
//!
//! `SyncEngine` wires the store, the refresh orchestrator, the guarded
//! writes and the derived views together, and reacts to session events from
//! the identity provider. Dropping it cancels whatever is still in flight.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth::{SessionData, SessionEvent};
use crate::cache::{CacheAges, TtlPolicy};
use crate::config::SyncSettings;
use crate::models::{NewPayment, PaymentSettings, ResourceKind, Subscription, Transaction};
use crate::notify::Notifier;
use crate::remote::RemoteService;
use crate::resilience::{
    smart_refresh, MutationError, Mutations, RetryPolicy, SmartRefreshSummary,
};
use crate::state::{Action, AppState, LoadingConcern, Store};
use crate::sync::{Orchestrator, RefreshOutcome, SessionGate, SyncError};
use crate::views::{recent_revenue, Dashboard, DashboardWatcher, SeriesBucket};

pub struct SyncEngine<R, N> {
    store: Store,
    orchestrator: Arc<Orchestrator<R>>,
    mutations: Mutations<R, N>,
    notifier: Arc<N>,
    retry: RetryPolicy,
    gate: Mutex<SessionGate>,
}

impl<R: RemoteService, N: Notifier> SyncEngine<R, N> {
    pub fn new(remote: R, notifier: N, settings: &SyncSettings) -> Self {
        Self::with_policies(
            Arc::new(remote),
            Arc::new(notifier),
            settings.ttl_policy(),
            settings.refresh_timeout(),
            settings.retry_policy(),
        )
    }

    pub fn with_policies(
        remote: Arc<R>,
        notifier: Arc<N>,
        ttl: TtlPolicy,
        refresh_timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Self {
        let store = Store::new(ttl);
        let orchestrator = Arc::new(Orchestrator::new(remote, store.clone(), refresh_timeout));
        let mutations = Mutations::new(Arc::clone(&orchestrator), Arc::clone(&notifier), retry);
        Self {
            store,
            orchestrator,
            mutations,
            notifier,
            retry,
            gate: Mutex::new(SessionGate::new()),
        }
    }

    fn gate(&self) -> MutexGuard<'_, SessionGate> {
        self.gate.lock().unwrap_or_else(|p| p.into_inner())
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Feed an event from the identity provider. When it establishes a new
    /// session, the first bulk refresh runs before this returns and its
    /// result is handed back.
    pub async fn on_session_event(
        &self,
        event: SessionEvent,
    ) -> Option<Result<RefreshOutcome, SyncError>> {
        match event {
            SessionEvent::Resolving => {
                self.store
                    .dispatch(Action::SetLoading(LoadingConcern::Auth, true));
                None
            }
            SessionEvent::Ready(session) if session.is_expired() => {
                debug!(user = %session.user_id, "Session already expired, treating as signed out");
                self.sign_out();
                None
            }
            SessionEvent::Ready(session) => {
                self.sign_in(session);
                self.ensure_started().await
            }
            SessionEvent::SignedOut => {
                self.sign_out();
                None
            }
        }
    }

    fn sign_in(&self, session: SessionData) {
        let changed = self
            .store
            .read(|state| state.session.as_ref().map(|s| s.user_id != session.user_id))
            .unwrap_or(true);
        if changed {
            info!(user = %session.user_id, "Session established");
            self.orchestrator.cancel_all();
        }
        let user_id = session.user_id.clone();
        self.store.dispatch(Action::SetAuth(Some(session)));
        self.store
            .dispatch(Action::SetLoading(LoadingConcern::Auth, false));
        self.gate().observe(Some(&user_id));
    }

    fn sign_out(&self) {
        info!("Signed out");
        self.orchestrator.cancel_all();
        self.store.dispatch(Action::SetAuth(None));
        self.store
            .dispatch(Action::SetLoading(LoadingConcern::Auth, false));
        self.gate().observe(None);
    }

    /// Start the automatic bulk refresh for the current session, unless it
    /// already started. Returns `None` when nothing was started.
    pub async fn ensure_started(&self) -> Option<Result<RefreshOutcome, SyncError>> {
        let user_id = self.store.read(|state| state.user_id().map(str::to_string))?;
        if !self.gate().try_begin() {
            return None;
        }
        let result = self.orchestrator.refresh_all(false).await;
        self.gate().finish(&user_id);
        Some(result)
    }

    // =========================================================================
    // Reads and refreshes
    // =========================================================================

    pub async fn refresh_all(&self, force: bool) -> Result<RefreshOutcome, SyncError> {
        self.orchestrator.refresh_all(force).await
    }

    pub async fn refresh_kinds(
        &self,
        kinds: &[ResourceKind],
        force: bool,
    ) -> Result<RefreshOutcome, SyncError> {
        self.orchestrator.refresh_kinds(kinds, force).await
    }

    pub async fn smart_refresh(&self, show_progress: bool) -> SmartRefreshSummary {
        smart_refresh(&*self.orchestrator, &*self.notifier, &self.retry, show_progress).await
    }

    /// Forget every cache timestamp so the next refresh fetches everything.
    pub fn invalidate(&self) {
        self.store.dispatch(Action::ClearCache);
    }

    /// Cancel in-flight refreshes without touching the session
    pub fn cancel(&self) -> usize {
        self.orchestrator.cancel_all()
    }

    /// Stop all background work. The cached data stays readable.
    pub fn shutdown(&self) {
        let cancelled = self.orchestrator.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "Cancelled in-flight refreshes on shutdown");
        }
    }

    pub fn snapshot(&self) -> AppState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_stale(&self, kind: ResourceKind) -> bool {
        self.store.is_stale(kind)
    }

    pub fn cache_ages(&self) -> CacheAges {
        self.store.read(|state| state.cache.ages_at(Utc::now()))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn record_payment(&self, payment: NewPayment) -> Result<Transaction, MutationError> {
        self.mutations.record_payment(payment).await
    }

    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, MutationError> {
        self.mutations.cancel_subscription(subscription_id).await
    }

    pub async fn update_payment_settings(
        &self,
        settings: PaymentSettings,
    ) -> Result<PaymentSettings, MutationError> {
        self.mutations.update_payment_settings(settings).await
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    pub fn dashboard(&self) -> Dashboard {
        self.store
            .read(|state| Dashboard::compute(&state.data, Utc::now()))
    }

    pub fn watch_dashboard(&self) -> DashboardWatcher {
        DashboardWatcher::new(self.store.subscribe())
    }

    /// Revenue for the last `days` days, daily or monthly by window length
    pub fn revenue_series(&self, days: u32) -> Vec<SeriesBucket> {
        self.store
            .read(|state| recent_revenue(state.data.transactions(), days, Utc::now()))
    }
}

impl<R, N> Drop for SyncEngine<R, N> {
    fn drop(&mut self) {
        self.orchestrator.cancel_all();
    }
}
