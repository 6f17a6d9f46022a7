//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use crate::auth::SessionData;
use crate::models::{
    NewPayment, PaymentMetrics, PaymentSettings, Person, Plan, ResourceKind, ResourcePayload, Role,
    Subscription, SubscriptionStatus, Transaction, TransactionStatus,
};
use crate::notify::{Notification, Notifier, NotifyLevel};
use crate::remote::{FetchScope, RemoteError, RemoteService};

#[derive(Default)]
struct Failures {
    /// Fails every time
    always: HashMap<ResourceKind, RemoteError>,
    /// Fails the next N times
    scripted: HashMap<ResourceKind, VecDeque<RemoteError>>,
}

/// Scriptable `RemoteService` that logs every call it receives.
pub struct MockRemote {
    role: Role,
    role_failure: Mutex<Option<RemoteError>>,
    payloads: Mutex<HashMap<ResourceKind, ResourcePayload>>,
    failures: Mutex<Failures>,
    write_failures: Mutex<VecDeque<RemoteError>>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new(role: Role) -> Self {
        let now = Utc::now();
        let subscription = Subscription {
            id: "s1".to_string(),
            person_id: "p1".to_string(),
            plan_id: "basic".to_string(),
            status: SubscriptionStatus::Active,
            start_date: now - chrono::Duration::days(10),
            end_date: Some(now + chrono::Duration::days(20)),
            cancelled_at: None,
        };
        let payloads: HashMap<ResourceKind, ResourcePayload> = [
            ResourcePayload::from(vec![Person::new("p1", "Ana Ruiz")]),
            ResourcePayload::from(vec![Plan::new("basic", "Basic", 50.0)]),
            ResourcePayload::from(vec![subscription]),
            ResourcePayload::from(Vec::<Transaction>::new()),
            ResourcePayload::from(PaymentMetrics::default()),
            ResourcePayload::from(PaymentSettings::default()),
        ]
        .into_iter()
        .map(|payload| (payload.kind(), payload))
        .collect();

        Self {
            role,
            role_failure: Mutex::new(None),
            payloads: Mutex::new(payloads),
            failures: Mutex::new(Failures::default()),
            write_failures: Mutex::new(VecDeque::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = delay;
    }

    pub fn with_payload(self, payload: impl Into<ResourcePayload>) -> Self {
        let payload = payload.into();
        self.payloads
            .lock()
            .expect("payload lock")
            .insert(payload.kind(), payload);
        self
    }

    /// Every fetch of `kind` fails with `error`
    pub fn fail_kind(self, kind: ResourceKind, error: RemoteError) -> Self {
        self.failures
            .lock()
            .expect("failure lock")
            .always
            .insert(kind, error);
        self
    }

    /// The next `times` fetches of `kind` fail with `error`
    pub fn fail_kind_times(self, kind: ResourceKind, error: RemoteError, times: usize) -> Self {
        self.failures
            .lock()
            .expect("failure lock")
            .scripted
            .entry(kind)
            .or_default()
            .extend(std::iter::repeat(error).take(times));
        self
    }

    pub fn fail_role(self, error: RemoteError) -> Self {
        *self.role_failure.lock().expect("role lock") = Some(error);
        self
    }

    /// The next `times` write calls fail with `error`
    pub fn fail_writes(self, error: RemoteError, times: usize) -> Self {
        self.write_failures
            .lock()
            .expect("write lock")
            .extend(std::iter::repeat(error).take(times));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }

    pub fn role_calls(&self) -> usize {
        self.calls().iter().filter(|c| *c == "role").count()
    }

    pub fn fetch_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("fetch:"))
            .count()
    }

    pub fn fetched_kinds(&self) -> Vec<ResourceKind> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("fetch:"))
            .filter_map(|name| ResourceKind::ALL.into_iter().find(|k| k.as_str() == name))
            .collect()
    }

    pub fn write_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("write:"))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().expect("delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn next_write_failure(&self) -> Option<RemoteError> {
        self.write_failures.lock().expect("write lock").pop_front()
    }
}

impl RemoteService for MockRemote {
    async fn resolve_role(&self, _session: &SessionData) -> Result<Role, RemoteError> {
        self.log("role".to_string());
        self.pause().await;
        match self.role_failure.lock().expect("role lock").clone() {
            Some(error) => Err(error),
            None => Ok(self.role),
        }
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        _scope: &FetchScope,
    ) -> Result<ResourcePayload, RemoteError> {
        self.log(format!("fetch:{}", kind.as_str()));
        self.pause().await;

        let failure = {
            let mut failures = self.failures.lock().expect("failure lock");
            match failures.scripted.get_mut(&kind).and_then(VecDeque::pop_front) {
                Some(error) => Some(error),
                None => failures.always.get(&kind).cloned(),
            }
        };
        if let Some(error) = failure {
            return Err(error);
        }

        self.payloads
            .lock()
            .expect("payload lock")
            .get(&kind)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(kind.to_string()))
    }

    async fn record_payment(
        &self,
        payment: &NewPayment,
        _scope: &FetchScope,
    ) -> Result<Transaction, RemoteError> {
        self.log("write:record_payment".to_string());
        self.pause().await;
        if let Some(error) = self.next_write_failure() {
            return Err(error);
        }
        let now = Utc::now();
        Ok(Transaction {
            id: "t-new".to_string(),
            person_id: payment.person_id.clone(),
            subscription_id: payment.subscription_id.clone(),
            amount: payment.amount,
            status: TransactionStatus::Paid,
            method: payment.method,
            paid_at: Some(payment.paid_at.unwrap_or(now)),
            created_at: now,
            notes: payment.notes.clone(),
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        _scope: &FetchScope,
    ) -> Result<Subscription, RemoteError> {
        self.log("write:cancel_subscription".to_string());
        self.pause().await;
        if let Some(error) = self.next_write_failure() {
            return Err(error);
        }
        let now = Utc::now();
        Ok(Subscription {
            id: subscription_id.to_string(),
            person_id: "p1".to_string(),
            plan_id: "basic".to_string(),
            status: SubscriptionStatus::Cancelled,
            start_date: now - chrono::Duration::days(10),
            end_date: Some(now),
            cancelled_at: Some(now),
        })
    }

    async fn update_payment_settings(
        &self,
        settings: &PaymentSettings,
        _scope: &FetchScope,
    ) -> Result<PaymentSettings, RemoteError> {
        self.log("write:update_payment_settings".to_string());
        self.pause().await;
        if let Some(error) = self.next_write_failure() {
            return Err(error);
        }
        Ok(PaymentSettings {
            updated_at: Some(Utc::now()),
            ..settings.clone()
        })
    }
}

/// Notifier that keeps everything it is given.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().expect("notifier lock").clone()
    }

    pub fn count(&self, level: NotifyLevel) -> usize {
        self.all().iter().filter(|n| n.level == level).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().expect("notifier lock").push(notification);
    }
}
