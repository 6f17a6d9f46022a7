use serde::{Deserialize, Serialize};

use super::ResourceKind;

/// Resources a trainer works with
const ADMINISTRATOR_RESOURCES: &[ResourceKind] = &[
    ResourceKind::Persons,
    ResourceKind::Plans,
    ResourceKind::Subscriptions,
    ResourceKind::Transactions,
    ResourceKind::PaymentMetrics,
    ResourceKind::PaymentSettings,
];

/// Resources a student sees about themselves
const SUBJECT_RESOURCES: &[ResourceKind] = &[
    ResourceKind::Plans,
    ResourceKind::Subscriptions,
    ResourceKind::Transactions,
    ResourceKind::PaymentSettings,
];

/// Privilege classification of the signed-in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A trainer managing students
    #[serde(alias = "admin", alias = "trainer")]
    Administrator,
    /// A student viewing their own records
    #[serde(alias = "student")]
    Subject,
}

impl Role {
    /// Resource kinds fetched for this role, in canonical fold order.
    pub fn resource_set(&self) -> &'static [ResourceKind] {
        match self {
            Role::Administrator => ADMINISTRATOR_RESOURCES,
            Role::Subject => SUBJECT_RESOURCES,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Administrator => write!(f, "administrator"),
            Role::Subject => write!(f, "subject"),
        }
    }
}
