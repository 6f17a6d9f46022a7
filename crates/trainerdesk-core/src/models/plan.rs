use serde::{Deserialize, Serialize};

/// A subscription plan offered by a trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Plan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "durationDays", alias = "duration_days", default = "default_duration_days")]
    pub duration_days: u32,
    /// Maximum number of concurrent subscribers, if the plan is capped
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(rename = "isActive", alias = "is_active", default = "default_is_active")]
    pub is_active: bool,
}

fn default_duration_days() -> u32 {
    30
}

fn default_is_active() -> bool {
    true
}

impl Plan {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            duration_days: default_duration_days(),
            capacity: None,
            is_active: true,
        }
    }

    /// True when subscribers are expected to pay for this plan
    pub fn is_paid(&self) -> bool {
        self.price > 0.0
    }
}
