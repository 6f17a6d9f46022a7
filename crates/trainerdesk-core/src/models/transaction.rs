use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    // Some backends report settled payments as "completed"
    #[serde(alias = "completed")]
    Paid,
    Pending,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Transfer,
    Card,
    Other,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Transfer => write!(f, "Transfer"),
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Other => write!(f, "Other"),
        }
    }
}

/// A financial transaction against a person (and optionally a subscription).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "personId", alias = "person_id")]
    pub person_id: String,
    #[serde(rename = "subscriptionId", alias = "subscription_id", default)]
    pub subscription_id: Option<String>,
    pub amount: f64,
    pub status: TransactionStatus,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(rename = "paidAt", alias = "paid_at", default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Transaction {
    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid
    }

    /// Date used for bucketing and recency: settlement time when known.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.paid_at.unwrap_or(self.created_at)
    }
}

/// A manual payment to be recorded through the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    #[serde(rename = "personId")]
    pub person_id: String,
    #[serde(rename = "subscriptionId", skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    pub amount: f64,
    pub method: PaymentMethod,
    #[serde(rename = "paidAt", skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(person_id: impl Into<String>, amount: f64) -> Self {
        Self {
            person_id: person_id.into(),
            subscription_id: None,
            amount,
            method: PaymentMethod::default(),
            paid_at: None,
            notes: None,
        }
    }
}
