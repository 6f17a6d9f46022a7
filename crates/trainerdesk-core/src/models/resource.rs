//! Resource kinds and the payloads that flow from the remote service
//! into the aggregate state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{PaymentMetrics, PaymentSettings, Person, Plan, Role, Subscription, Transaction};

/// A named cached collection or singleton.
///
/// Variants are declared in canonical fold order: results of a fan-out are
/// applied sorted by this order (people before the subscriptions that
/// reference them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Persons,
    Plans,
    Subscriptions,
    Transactions,
    PaymentMetrics,
    PaymentSettings,
    /// The authorization fact (role classification)
    RoleStatus,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Persons,
        ResourceKind::Plans,
        ResourceKind::Subscriptions,
        ResourceKind::Transactions,
        ResourceKind::PaymentMetrics,
        ResourceKind::PaymentSettings,
        ResourceKind::RoleStatus,
    ];

    /// Stable identifier used in logs and REST paths
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Persons => "persons",
            ResourceKind::Plans => "plans",
            ResourceKind::Subscriptions => "subscriptions",
            ResourceKind::Transactions => "transactions",
            ResourceKind::PaymentMetrics => "payment-metrics",
            ResourceKind::PaymentSettings => "payment-settings",
            ResourceKind::RoleStatus => "role-status",
        }
    }

    /// Human-readable name for status messages
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Persons => "Students",
            ResourceKind::Plans => "Plans",
            ResourceKind::Subscriptions => "Subscriptions",
            ResourceKind::Transactions => "Transactions",
            ResourceKind::PaymentMetrics => "Payment metrics",
            ResourceKind::PaymentSettings => "Payment settings",
            ResourceKind::RoleStatus => "Role",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of one resource kind as delivered by the remote service.
///
/// Collections are held behind `Arc` so snapshots are cheap to clone and a
/// replaced collection is detectable by pointer identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    Persons(Arc<Vec<Person>>),
    Plans(Arc<Vec<Plan>>),
    Subscriptions(Arc<Vec<Subscription>>),
    Transactions(Arc<Vec<Transaction>>),
    PaymentMetrics(Arc<PaymentMetrics>),
    PaymentSettings(Arc<PaymentSettings>),
    RoleStatus(Role),
}

impl ResourcePayload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourcePayload::Persons(_) => ResourceKind::Persons,
            ResourcePayload::Plans(_) => ResourceKind::Plans,
            ResourcePayload::Subscriptions(_) => ResourceKind::Subscriptions,
            ResourcePayload::Transactions(_) => ResourceKind::Transactions,
            ResourcePayload::PaymentMetrics(_) => ResourceKind::PaymentMetrics,
            ResourcePayload::PaymentSettings(_) => ResourceKind::PaymentSettings,
            ResourcePayload::RoleStatus(_) => ResourceKind::RoleStatus,
        }
    }

    /// Number of records carried (singletons count as one)
    pub fn len(&self) -> usize {
        match self {
            ResourcePayload::Persons(v) => v.len(),
            ResourcePayload::Plans(v) => v.len(),
            ResourcePayload::Subscriptions(v) => v.len(),
            ResourcePayload::Transactions(v) => v.len(),
            ResourcePayload::PaymentMetrics(_)
            | ResourcePayload::PaymentSettings(_)
            | ResourcePayload::RoleStatus(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Person>> for ResourcePayload {
    fn from(v: Vec<Person>) -> Self {
        ResourcePayload::Persons(Arc::new(v))
    }
}

impl From<Vec<Plan>> for ResourcePayload {
    fn from(v: Vec<Plan>) -> Self {
        ResourcePayload::Plans(Arc::new(v))
    }
}

impl From<Vec<Subscription>> for ResourcePayload {
    fn from(v: Vec<Subscription>) -> Self {
        ResourcePayload::Subscriptions(Arc::new(v))
    }
}

impl From<Vec<Transaction>> for ResourcePayload {
    fn from(v: Vec<Transaction>) -> Self {
        ResourcePayload::Transactions(Arc::new(v))
    }
}

impl From<PaymentMetrics> for ResourcePayload {
    fn from(v: PaymentMetrics) -> Self {
        ResourcePayload::PaymentMetrics(Arc::new(v))
    }
}

impl From<PaymentSettings> for ResourcePayload {
    fn from(v: PaymentSettings) -> Self {
        ResourcePayload::PaymentSettings(Arc::new(v))
    }
}

/// Current authoritative value of every resource kind.
/// `None` until the kind has been loaded at least once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceData {
    pub persons: Option<Arc<Vec<Person>>>,
    pub plans: Option<Arc<Vec<Plan>>>,
    pub subscriptions: Option<Arc<Vec<Subscription>>>,
    pub transactions: Option<Arc<Vec<Transaction>>>,
    pub payment_metrics: Option<Arc<PaymentMetrics>>,
    pub payment_settings: Option<Arc<PaymentSettings>>,
}

impl ResourceData {
    /// Replace the slot matching the payload's kind.
    /// Role payloads are not resource data and are ignored here.
    pub fn apply(&mut self, payload: ResourcePayload) {
        match payload {
            ResourcePayload::Persons(v) => self.persons = Some(v),
            ResourcePayload::Plans(v) => self.plans = Some(v),
            ResourcePayload::Subscriptions(v) => self.subscriptions = Some(v),
            ResourcePayload::Transactions(v) => self.transactions = Some(v),
            ResourcePayload::PaymentMetrics(v) => self.payment_metrics = Some(v),
            ResourcePayload::PaymentSettings(v) => self.payment_settings = Some(v),
            ResourcePayload::RoleStatus(_) => {}
        }
    }

    pub fn is_loaded(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Persons => self.persons.is_some(),
            ResourceKind::Plans => self.plans.is_some(),
            ResourceKind::Subscriptions => self.subscriptions.is_some(),
            ResourceKind::Transactions => self.transactions.is_some(),
            ResourceKind::PaymentMetrics => self.payment_metrics.is_some(),
            ResourceKind::PaymentSettings => self.payment_settings.is_some(),
            ResourceKind::RoleStatus => false,
        }
    }

    pub fn persons(&self) -> &[Person] {
        self.persons.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn plans(&self) -> &[Plan] {
        self.plans.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        self.subscriptions.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_person(&self, id: &str) -> Option<&Person> {
        self.persons().iter().find(|p| p.id == id)
    }

    pub fn find_subscription(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions().iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_is_canonical() {
        let mut kinds = vec![
            ResourceKind::Transactions,
            ResourceKind::Persons,
            ResourceKind::Subscriptions,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Persons,
                ResourceKind::Subscriptions,
                ResourceKind::Transactions
            ]
        );
    }

    #[test]
    fn test_apply_replaces_only_matching_slot() {
        let mut data = ResourceData::default();
        data.apply(vec![Plan::new("basic", "Basic", 50.0)].into());
        assert!(data.is_loaded(ResourceKind::Plans));
        assert!(!data.is_loaded(ResourceKind::Persons));
        assert_eq!(data.plans().len(), 1);

        data.apply(ResourcePayload::RoleStatus(Role::Subject));
        assert_eq!(data.plans().len(), 1);
    }

    #[test]
    fn test_payload_kind_and_len() {
        let payload: ResourcePayload = vec![Person::new("a", "A"), Person::new("b", "B")].into();
        assert_eq!(payload.kind(), ResourceKind::Persons);
        assert_eq!(payload.len(), 2);
        let payload: ResourcePayload = PaymentSettings::default().into();
        assert_eq!(payload.len(), 1);
    }
}
