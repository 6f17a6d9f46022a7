//! Guarded writes to the remote service.
//!
//! Each write is validated locally first, refuses to run twice at once for
//! the same target, retries transient failures, and on success refreshes
//! the kinds it affects so the cache never serves the pre-write value.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{
    NewPayment, PaymentSettings, ResourceKind, ResourcePayload, Subscription, Transaction,
};
use crate::notify::{Notification, Notifier};
use crate::remote::{FetchScope, RemoteError, RemoteService};
use crate::state::{Action, Store};
use crate::sync::Orchestrator;
use crate::utils::format_amount;

use super::{with_backoff, RetryPolicy};

/// Rejected before anything was sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Not signed in")]
    NoSession,

    #[error("Amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("Unknown student: {0}")]
    UnknownPerson(String),

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    #[error("Subscription {0} is not active")]
    SubscriptionNotActive(String),

    #[error("Invalid payment settings: {0}")]
    InvalidSettings(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} is already being saved")]
    InProgress(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl MutationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, MutationError::Validation(_))
    }
}

/// Releases a write key when the write finishes or is dropped.
struct KeyGuard<'a> {
    keys: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(|p| p.into_inner());
        keys.remove(&self.key);
    }
}

pub struct Mutations<R, N> {
    orchestrator: Arc<Orchestrator<R>>,
    notifier: Arc<N>,
    policy: RetryPolicy,
    in_progress: Mutex<HashSet<String>>,
}

impl<R: RemoteService, N: Notifier> Mutations<R, N> {
    pub fn new(orchestrator: Arc<Orchestrator<R>>, notifier: Arc<N>, policy: RetryPolicy) -> Self {
        Self {
            orchestrator,
            notifier,
            policy,
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    fn store(&self) -> &Store {
        self.orchestrator.store()
    }

    fn remote(&self) -> &R {
        self.orchestrator.remote()
    }

    fn scope(&self) -> Result<FetchScope, ValidationError> {
        self.store().read(|state| match (&state.session, state.role) {
            (Some(session), Some(role)) => Ok(FetchScope::new(session, role)),
            _ => Err(ValidationError::NoSession),
        })
    }

    fn claim(&self, key: String) -> Result<KeyGuard<'_>, MutationError> {
        let mut keys = self.in_progress.lock().unwrap_or_else(|p| p.into_inner());
        if !keys.insert(key.clone()) {
            debug!(key = %key, "Write already in progress");
            return Err(MutationError::InProgress(key));
        }
        Ok(KeyGuard {
            keys: &self.in_progress,
            key,
        })
    }

    /// Refresh what a successful write made stale. A failure here does not
    /// undo the write; the next refresh picks it up.
    async fn write_through(&self, kinds: &[ResourceKind]) {
        if let Err(e) = self.orchestrator.refresh_kinds(kinds, true).await {
            warn!(error = %e, "Refresh after write failed");
        }
    }

    fn report_failure(&self, title: &str, error: &RemoteError, attempts: u32) {
        error!(error = %error, attempts, "{} failed", title);
        self.notifier
            .notify(Notification::error(title, error.user_message()));
    }

    pub async fn record_payment(&self, payment: NewPayment) -> Result<Transaction, MutationError> {
        let scope = self.scope()?;
        self.validate_payment(&payment)?;
        let _guard = self.claim(format!("payment:{}", payment.person_id))?;

        let attempted = with_backoff(&self.policy, "record payment", |_| {
            self.remote().record_payment(&payment, &scope)
        })
        .await;

        match attempted.result {
            Ok(transaction) => {
                info!(person = %payment.person_id, amount = payment.amount, "Payment recorded");
                let currency = self.currency();
                self.notifier.notify(Notification::success(
                    "Payment recorded",
                    format_amount(transaction.amount, &currency),
                ));
                self.write_through(&[
                    ResourceKind::Persons,
                    ResourceKind::Subscriptions,
                    ResourceKind::Transactions,
                    ResourceKind::PaymentMetrics,
                ])
                .await;
                Ok(transaction)
            }
            Err(e) => {
                self.report_failure("Payment not recorded", &e, attempted.attempts);
                Err(e.into())
            }
        }
    }

    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, MutationError> {
        let scope = self.scope()?;
        self.validate_cancellation(subscription_id)?;
        let _guard = self.claim(format!("subscription:{}", subscription_id))?;

        let attempted = with_backoff(&self.policy, "cancel subscription", |_| {
            self.remote().cancel_subscription(subscription_id, &scope)
        })
        .await;

        match attempted.result {
            Ok(subscription) => {
                info!(subscription = subscription_id, "Subscription cancelled");
                self.notifier.notify(Notification::success(
                    "Subscription cancelled",
                    format!("Subscription {} is no longer active", subscription_id),
                ));
                self.write_through(&[
                    ResourceKind::Persons,
                    ResourceKind::Subscriptions,
                    ResourceKind::PaymentMetrics,
                ])
                .await;
                Ok(subscription)
            }
            Err(e) => {
                self.report_failure("Subscription not cancelled", &e, attempted.attempts);
                Err(e.into())
            }
        }
    }

    pub async fn update_payment_settings(
        &self,
        settings: PaymentSettings,
    ) -> Result<PaymentSettings, MutationError> {
        let scope = self.scope()?;
        settings
            .validate()
            .map_err(ValidationError::InvalidSettings)?;
        let _guard = self.claim("payment-settings".to_string())?;

        let attempted = with_backoff(&self.policy, "update payment settings", |_| {
            self.remote().update_payment_settings(&settings, &scope)
        })
        .await;

        match attempted.result {
            Ok(saved) => {
                info!(currency = %saved.currency, "Payment settings saved");
                // The response is the new value; no need to fetch it again
                let store = self.store();
                store.dispatch(Action::SetResource {
                    payload: ResourcePayload::from(saved.clone()),
                    generation: Some(store.next_generation()),
                });
                self.notifier
                    .notify(Notification::success("Settings saved", "Payment settings updated"));
                Ok(saved)
            }
            Err(e) => {
                self.report_failure("Settings not saved", &e, attempted.attempts);
                Err(e.into())
            }
        }
    }

    fn currency(&self) -> String {
        self.store().read(|state| {
            state
                .data
                .payment_settings
                .as_ref()
                .map(|s| s.currency.clone())
                .unwrap_or_else(|| PaymentSettings::default().currency)
        })
    }

    /// People and subscriptions are only checked when they are loaded; a
    /// student session never loads the people list.
    fn validate_payment(&self, payment: &NewPayment) -> Result<(), ValidationError> {
        if !payment.amount.is_finite() || payment.amount <= 0.0 {
            return Err(ValidationError::InvalidAmount(payment.amount));
        }
        self.store().read(|state| {
            let data = &state.data;
            if data.persons.is_some() && data.find_person(&payment.person_id).is_none() {
                return Err(ValidationError::UnknownPerson(payment.person_id.clone()));
            }
            if let Some(id) = &payment.subscription_id {
                if data.subscriptions.is_some() && data.find_subscription(id).is_none() {
                    return Err(ValidationError::UnknownSubscription(id.clone()));
                }
            }
            Ok(())
        })
    }

    fn validate_cancellation(&self, subscription_id: &str) -> Result<(), ValidationError> {
        self.store().read(|state| {
            let data = &state.data;
            if data.subscriptions.is_none() {
                return Ok(());
            }
            match data.find_subscription(subscription_id) {
                None => Err(ValidationError::UnknownSubscription(
                    subscription_id.to_string(),
                )),
                Some(sub) if !sub.is_current() => Err(ValidationError::SubscriptionNotActive(
                    subscription_id.to_string(),
                )),
                Some(_) => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionData;
    use crate::models::Role;
    use crate::notify::NotifyLevel;
    use crate::sync::DEFAULT_REFRESH_TIMEOUT;
    use crate::test_support::{MockRemote, RecordingNotifier};

    struct Harness {
        remote: Arc<MockRemote>,
        notifier: Arc<RecordingNotifier>,
        mutations: Mutations<MockRemote, RecordingNotifier>,
    }

    async fn harness(remote: MockRemote) -> Harness {
        let remote = Arc::new(remote);
        let store = Store::default();
        store.dispatch(Action::SetAuth(Some(SessionData::new("trainer-1", "tok"))));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&remote),
            store,
            DEFAULT_REFRESH_TIMEOUT,
        ));
        orchestrator.refresh_all(false).await.expect("warm cache");

        let notifier = Arc::new(RecordingNotifier::default());
        let mutations = Mutations::new(orchestrator, Arc::clone(&notifier), RetryPolicy::default());
        Harness {
            remote,
            notifier,
            mutations,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_transient_failures_notify_once_and_keep_data() {
        let h = harness(
            MockRemote::new(Role::Administrator)
                .fail_writes(RemoteError::ServerError("busy".into()), 3),
        )
        .await;
        let before = h.mutations.store().snapshot().data;

        let err = h
            .mutations
            .record_payment(NewPayment::new("p1", 50.0))
            .await
            .expect_err("should fail");

        assert!(matches!(err, MutationError::Remote(RemoteError::ServerError(_))));
        assert_eq!(h.remote.write_calls(), 3);
        assert_eq!(h.notifier.count(NotifyLevel::Error), 1);
        assert_eq!(h.notifier.all().len(), 1);
        assert_eq!(h.mutations.store().snapshot().data, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success_refreshes_affected_kinds() {
        let h = harness(
            MockRemote::new(Role::Administrator).fail_writes(RemoteError::Timeout, 1),
        )
        .await;
        let fetches_before = h.remote.fetch_calls();

        let tx = h
            .mutations
            .record_payment(NewPayment::new("p1", 50.0))
            .await
            .expect("payment");

        assert_eq!(tx.amount, 50.0);
        assert_eq!(h.remote.write_calls(), 2);
        assert_eq!(h.remote.fetch_calls(), fetches_before + 4);
        assert_eq!(h.notifier.count(NotifyLevel::Success), 1);
        assert_eq!(h.notifier.count(NotifyLevel::Error), 0);
    }

    #[tokio::test]
    async fn test_validation_short_circuits_without_remote_calls() {
        let h = harness(MockRemote::new(Role::Administrator)).await;
        let calls = h.remote.total_calls();

        let err = h
            .mutations
            .record_payment(NewPayment::new("p1", -5.0))
            .await
            .expect_err("negative amount");
        assert_eq!(err, MutationError::Validation(ValidationError::InvalidAmount(-5.0)));
        assert!(err.is_validation());

        let err = h
            .mutations
            .record_payment(NewPayment::new("ghost", 10.0))
            .await
            .expect_err("unknown person");
        assert!(matches!(
            err,
            MutationError::Validation(ValidationError::UnknownPerson(_))
        ));

        let err = h
            .mutations
            .cancel_subscription("nope")
            .await
            .expect_err("unknown subscription");
        assert!(err.is_validation());

        let bad = PaymentSettings {
            currency: "usd".to_string(),
            ..Default::default()
        };
        let err = h
            .mutations
            .update_payment_settings(bad)
            .await
            .expect_err("bad currency");
        assert!(matches!(
            err,
            MutationError::Validation(ValidationError::InvalidSettings(_))
        ));

        assert_eq!(h.remote.total_calls(), calls);
        assert!(h.notifier.all().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_write_is_rejected_while_in_progress() {
        let h = harness(MockRemote::new(Role::Administrator)).await;
        h.remote.set_delay(std::time::Duration::from_millis(20));

        let (a, b) = tokio::join!(
            h.mutations.cancel_subscription("s1"),
            h.mutations.cancel_subscription("s1"),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(MutationError::InProgress(key)) if key == "subscription:s1")));
        assert_eq!(h.remote.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_settings_update_is_folded_from_response() {
        let h = harness(MockRemote::new(Role::Administrator)).await;
        let fetches_before = h.remote.fetch_calls();

        let settings = PaymentSettings {
            currency: "EUR".to_string(),
            grace_period_days: 10,
            ..Default::default()
        };
        h.mutations
            .update_payment_settings(settings)
            .await
            .expect("saved");

        let state = h.mutations.store().snapshot();
        let stored = state.data.payment_settings.clone().expect("settings");
        assert_eq!(stored.currency, "EUR");
        assert_eq!(stored.grace_period_days, 10);
        assert!(!state.is_stale(ResourceKind::PaymentSettings));
        assert_eq!(h.remote.fetch_calls(), fetches_before);
    }
}
