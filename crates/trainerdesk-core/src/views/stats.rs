use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PaymentMetrics, ResourceData};

use super::status::{subject_statuses, PaymentStatus, SubjectStatus};

/// Totals over every subject's status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct PaymentStats {
    pub total_revenue: f64,
    pub monthly_revenue: f64,
    pub pending_amount: f64,
    pub overdue_amount: f64,
    pub paid: u32,
    pub due_soon: u32,
    pub overdue: u32,
    pub inactive: u32,
    pub active_subscriptions: u32,
}

impl PaymentStats {
    /// One pass over already classified subjects.
    pub fn from_statuses(statuses: &[SubjectStatus]) -> Self {
        statuses.iter().fold(Self::default(), |mut stats, s| {
            stats.total_revenue += s.paid_total;
            stats.monthly_revenue += s.paid_this_month;
            stats.pending_amount += s.pending_total;
            match s.status {
                PaymentStatus::Paid => stats.paid += 1,
                PaymentStatus::DueSoon => {
                    stats.due_soon += 1;
                    // A pending transaction already covers part of what is due
                    stats.pending_amount += (s.amount_due - s.pending_total).max(0.0);
                }
                PaymentStatus::Overdue => {
                    stats.overdue += 1;
                    stats.overdue_amount += s.amount_due;
                }
                PaymentStatus::Inactive => stats.inactive += 1,
            }
            if s.has_current_subscription {
                stats.active_subscriptions += 1;
            }
            stats
        })
    }

    pub fn total_subjects(&self) -> u32 {
        self.paid + self.due_soon + self.overdue + self.inactive
    }
}

/// Headline metrics computed from the cached resources, for backends that
/// do not serve their own.
pub fn derive_metrics(data: &ResourceData, now: DateTime<Utc>) -> PaymentMetrics {
    PaymentMetrics::from_stats(&PaymentStats::from_statuses(&subject_statuses(data, now)), now)
}

impl PaymentMetrics {
    pub fn from_stats(stats: &PaymentStats, now: DateTime<Utc>) -> Self {
        Self {
            total_revenue: stats.total_revenue,
            monthly_revenue: stats.monthly_revenue,
            pending_amount: stats.pending_amount,
            overdue_amount: stats.overdue_amount,
            active_subscriptions: stats.active_subscriptions,
            overdue_count: stats.overdue,
            updated_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: PaymentStatus, paid: f64, due: f64) -> SubjectStatus {
        SubjectStatus {
            person_id: "p".to_string(),
            name: "P".to_string(),
            status,
            plan_id: None,
            plan_name: None,
            amount_due: due,
            expiry: None,
            days_until_expiry: None,
            last_payment: None,
            paid_total: paid,
            paid_this_month: paid / 2.0,
            pending_total: 0.0,
            has_current_subscription: status != PaymentStatus::Inactive,
        }
    }

    #[test]
    fn test_stats_fold() {
        let rows = vec![
            row(PaymentStatus::Paid, 100.0, 0.0),
            row(PaymentStatus::DueSoon, 40.0, 50.0),
            row(PaymentStatus::Overdue, 0.0, 30.0),
            row(PaymentStatus::Overdue, 0.0, 20.0),
            row(PaymentStatus::Inactive, 10.0, 0.0),
        ];
        let stats = PaymentStats::from_statuses(&rows);

        assert_eq!(stats.total_revenue, 150.0);
        assert_eq!(stats.monthly_revenue, 75.0);
        assert_eq!(stats.pending_amount, 50.0);
        assert_eq!(stats.overdue_amount, 50.0);
        assert_eq!((stats.paid, stats.due_soon, stats.overdue, stats.inactive), (1, 1, 2, 1));
        assert_eq!(stats.active_subscriptions, 4);
        assert_eq!(stats.total_subjects(), 5);
    }

    #[test]
    fn test_pending_payment_is_not_counted_twice_for_due_soon() {
        let mut covered = row(PaymentStatus::DueSoon, 0.0, 50.0);
        covered.pending_total = 50.0;
        let mut partly = row(PaymentStatus::DueSoon, 0.0, 50.0);
        partly.pending_total = 20.0;

        assert_eq!(PaymentStats::from_statuses(&[covered.clone()]).pending_amount, 50.0);
        assert_eq!(PaymentStats::from_statuses(&[covered, partly]).pending_amount, 100.0);
    }

    #[test]
    fn test_metrics_from_stats() {
        let now = Utc::now();
        let stats = PaymentStats::from_statuses(&[
            row(PaymentStatus::Paid, 100.0, 0.0),
            row(PaymentStatus::Overdue, 0.0, 30.0),
        ]);
        let metrics = PaymentMetrics::from_stats(&stats, now);
        assert_eq!(metrics.total_revenue, 100.0);
        assert_eq!(metrics.overdue_amount, 30.0);
        assert_eq!(metrics.overdue_count, 1);
        assert_eq!(metrics.active_subscriptions, 2);
        assert_eq!(metrics.updated_at, Some(now));
    }

    #[test]
    fn test_empty_data_derives_zero_metrics() {
        let now = Utc::now();
        let metrics = derive_metrics(&ResourceData::default(), now);
        assert_eq!(metrics.total_revenue, 0.0);
        assert_eq!(metrics.overdue_count, 0);
        assert_eq!(metrics.updated_at, Some(now));
    }
}
