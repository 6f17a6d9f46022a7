use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest reminder lead time / grace period accepted, in days
const MAX_SETTINGS_DAYS: u32 = 90;

/// Headline payment figures for a trainer.
///
/// Usually served by the remote service, but can be derived locally from
/// persons, subscriptions and transactions when the backend has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct PaymentMetrics {
    #[serde(rename = "totalRevenue", alias = "total_revenue", default)]
    pub total_revenue: f64,
    #[serde(rename = "monthlyRevenue", alias = "monthly_revenue", default)]
    pub monthly_revenue: f64,
    #[serde(rename = "pendingAmount", alias = "pending_amount", default)]
    pub pending_amount: f64,
    #[serde(rename = "overdueAmount", alias = "overdue_amount", default)]
    pub overdue_amount: f64,
    #[serde(rename = "activeSubscriptions", alias = "active_subscriptions", default)]
    pub active_subscriptions: u32,
    #[serde(rename = "overdueCount", alias = "overdue_count", default)]
    pub overdue_count: u32,
    #[serde(rename = "updatedAt", alias = "updated_at", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Trainer-wide payment preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct PaymentSettings {
    pub currency: String,
    #[serde(rename = "reminderDaysBefore", alias = "reminder_days_before", default)]
    pub reminder_days_before: u32,
    #[serde(rename = "gracePeriodDays", alias = "grace_period_days", default)]
    pub grace_period_days: u32,
    #[serde(rename = "autoReminders", alias = "auto_reminders", default)]
    pub auto_reminders: bool,
    #[serde(rename = "updatedAt", alias = "updated_at", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            reminder_days_before: 3,
            grace_period_days: 5,
            auto_reminders: false,
            updated_at: None,
        }
    }
}

impl PaymentSettings {
    /// Check the settings are acceptable before sending them anywhere.
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let currency_ok =
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !currency_ok {
            return Err(format!(
                "Currency must be a 3-letter ISO code, got '{}'",
                self.currency
            ));
        }
        if self.reminder_days_before > MAX_SETTINGS_DAYS {
            return Err(format!(
                "Reminder lead time must be at most {} days",
                MAX_SETTINGS_DAYS
            ));
        }
        if self.grace_period_days > MAX_SETTINGS_DAYS {
            return Err(format!(
                "Grace period must be at most {} days",
                MAX_SETTINGS_DAYS
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(PaymentSettings::default().validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = PaymentSettings {
            currency: "usd".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        settings.currency = "EUR".to_string();
        settings.grace_period_days = 120;
        assert!(settings.validate().unwrap_err().contains("Grace period"));
    }
}
