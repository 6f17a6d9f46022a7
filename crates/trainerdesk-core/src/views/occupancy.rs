use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::ResourceData;

/// How full a plan is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct PlanOccupancy {
    pub plan_id: String,
    pub plan_name: String,
    pub active: u32,
    /// `None` for plans without a seat limit
    pub capacity: Option<u32>,
}

impl PlanOccupancy {
    /// Share of seats taken, in `0.0..=1.0` (more when oversubscribed)
    pub fn ratio(&self) -> Option<f64> {
        match self.capacity {
            Some(0) | None => None,
            Some(capacity) => Some(self.active as f64 / capacity as f64),
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|capacity| self.active >= capacity)
    }

    pub fn remaining(&self) -> Option<u32> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.active))
    }
}

/// Current subscriptions per active plan, in the plan list's order.
pub fn plan_occupancy(data: &ResourceData) -> Vec<PlanOccupancy> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for sub in data.subscriptions().iter().filter(|s| s.is_current()) {
        *counts.entry(sub.plan_id.as_str()).or_default() += 1;
    }

    data.plans()
        .iter()
        .filter(|plan| plan.is_active)
        .map(|plan| PlanOccupancy {
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            active: counts.get(plan.id.as_str()).copied().unwrap_or(0),
            capacity: plan.capacity,
        })
        .collect()
}
