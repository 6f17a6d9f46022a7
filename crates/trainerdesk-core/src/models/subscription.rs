use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MembershipStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    ExpiringSoon,
    Expired,
    Cancelled,
    Pending,
}

impl SubscriptionStatus {
    /// Map onto the membership vocabulary used by status classification.
    pub fn as_membership(&self) -> MembershipStatus {
        match self {
            SubscriptionStatus::Active => MembershipStatus::Active,
            SubscriptionStatus::ExpiringSoon => MembershipStatus::ExpiringSoon,
            SubscriptionStatus::Expired => MembershipStatus::Expired,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Pending => MembershipStatus::Inactive,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "Active"),
            SubscriptionStatus::ExpiringSoon => write!(f, "Expiring Soon"),
            SubscriptionStatus::Expired => write!(f, "Expired"),
            SubscriptionStatus::Cancelled => write!(f, "Cancelled"),
            SubscriptionStatus::Pending => write!(f, "Pending"),
        }
    }
}

/// A person's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Subscription {
    pub id: String,
    #[serde(rename = "personId", alias = "person_id")]
    pub person_id: String,
    #[serde(rename = "planId", alias = "plan_id")]
    pub plan_id: String,
    pub status: SubscriptionStatus,
    #[serde(rename = "startDate", alias = "start_date")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "endDate", alias = "end_date", default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "cancelledAt", alias = "cancelled_at", default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Counts towards plan occupancy
    pub fn is_current(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::ExpiringSoon
        )
    }
}
