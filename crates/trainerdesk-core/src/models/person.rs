use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Membership state as recorded on a person row.
///
/// Mirrors the subscription lifecycle but lives on the person so that
/// subjects without any subscription record can still be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    ExpiringSoon,
    Expired,
    Inactive,
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipStatus::Active => write!(f, "Active"),
            MembershipStatus::ExpiringSoon => write!(f, "Expiring Soon"),
            MembershipStatus::Expired => write!(f, "Expired"),
            MembershipStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

/// A person record: a trainer's student, or the signed-in subject themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Person {
    pub id: String,
    #[serde(rename = "fullName", alias = "full_name")]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "trainerId", alias = "trainer_id", default)]
    pub trainer_id: Option<String>,
    #[serde(rename = "planId", alias = "plan_id", default)]
    pub plan_id: Option<String>,
    #[serde(rename = "membershipStatus", alias = "membership_status", default)]
    pub membership_status: Option<MembershipStatus>,
    #[serde(rename = "membershipExpiry", alias = "membership_expiry", default)]
    pub membership_expiry: Option<DateTime<Utc>>,
    #[serde(rename = "lastPaymentDate", alias = "last_payment_date", default)]
    pub last_payment_date: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", alias = "created_at", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Person {
    /// Minimal person with only an id and a name; everything else unset.
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: None,
            phone: None,
            trainer_id: None,
            plan_id: None,
            membership_status: None,
            membership_expiry: None,
            last_payment_date: None,
            created_at: None,
        }
    }

    /// Display name, falling back to the id for blank names
    pub fn display_name(&self) -> &str {
        let trimmed = self.full_name.trim();
        if trimmed.is_empty() {
            &self.id
        } else {
            trimmed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_deserializes_camel_and_snake_case() {
        let camel = r#"{"id":"p1","fullName":"Ana Ruiz","membershipStatus":"expiring_soon","planId":"basic"}"#;
        let person: Person = serde_json::from_str(camel).expect("camelCase person");
        assert_eq!(person.membership_status, Some(MembershipStatus::ExpiringSoon));
        assert_eq!(person.plan_id.as_deref(), Some("basic"));

        let snake = r#"{"id":"p2","full_name":"Leo Park","membership_expiry":"2024-03-01T00:00:00Z"}"#;
        let person: Person = serde_json::from_str(snake).expect("snake_case person");
        assert_eq!(person.full_name, "Leo Park");
        assert!(person.membership_expiry.is_some());
        assert!(person.membership_status.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut person = Person::new("p9", "  ");
        assert_eq!(person.display_name(), "p9");
        person.full_name = " Mia Chen ".to_string();
        assert_eq!(person.display_name(), "Mia Chen");
    }
}
