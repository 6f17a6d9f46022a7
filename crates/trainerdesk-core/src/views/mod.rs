//! Business views derived from the cached resources.
//!
//! Everything here is a pure function of a `ResourceData` snapshot and a
//! point in time; nothing is cached except by `DashboardWatcher`, which only
//! recomputes when an input collection is replaced.

pub mod occupancy;
pub mod series;
pub mod stats;
pub mod status;
pub mod watcher;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{PaymentMetrics, ResourceData};

pub use occupancy::{plan_occupancy, PlanOccupancy};
pub use series::{recent_revenue, revenue_series, Granularity, SeriesBucket};
pub use stats::{derive_metrics, PaymentStats};
pub use status::{classify, subject_statuses, PaymentStatus, StatusInput, SubjectStatus};
pub use watcher::DashboardWatcher;

/// Everything the overview screen shows, computed in one go.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub statuses: Vec<SubjectStatus>,
    pub stats: PaymentStats,
    pub occupancy: Vec<PlanOccupancy>,
    /// Served metrics when loaded, otherwise derived from `stats`
    pub metrics: PaymentMetrics,
    pub computed_at: DateTime<Utc>,
}

impl Dashboard {
    pub fn compute(data: &ResourceData, now: DateTime<Utc>) -> Self {
        let mut statuses = subject_statuses(data, now);
        let stats = PaymentStats::from_statuses(&statuses);
        statuses.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.name.cmp(&b.name)));

        let metrics = match &data.payment_metrics {
            Some(metrics) => PaymentMetrics::clone(metrics),
            None => PaymentMetrics::from_stats(&stats, now),
        };

        Self {
            statuses,
            occupancy: plan_occupancy(data),
            stats,
            metrics,
            computed_at: now,
        }
    }

    /// Subjects that currently owe money, most urgent first
    pub fn outstanding(&self) -> impl Iterator<Item = &SubjectStatus> {
        self.statuses.iter().filter(|s| s.status.is_outstanding())
    }
}
