//! Revenue over time, bucketed for charts.
//!
//! Windows of up to 30 days get one bucket per day, longer ones one per
//! calendar month. Buckets are half-open `[start, end)` and contiguous, so
//! each transaction lands in at most one.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Transaction, TransactionStatus};

/// Longest window still shown day by day
const MAX_DAILY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    pub fn for_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if (end - start).num_days() <= MAX_DAILY_WINDOW_DAYS {
            Granularity::Day
        } else {
            Granularity::Month
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SeriesBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
    pub paid: f64,
    pub pending: f64,
    pub failed: f64,
}

impl SeriesBucket {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, granularity: Granularity) -> Self {
        let label = match granularity {
            Granularity::Day => start.format("%b %d").to_string(),
            Granularity::Month => start.format("%b %Y").to_string(),
        };
        Self {
            start,
            end,
            label,
            paid: 0.0,
            pending: 0.0,
            failed: 0.0,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn total(&self) -> f64 {
        self.paid + self.pending + self.failed
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn month_start(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive().with_day(1).unwrap_or_else(|| at.date_naive())
}

fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Empty buckets covering `[start, end)`, snapped to day or month boundaries.
pub fn buckets(start: DateTime<Utc>, end: DateTime<Utc>, granularity: Granularity) -> Vec<SeriesBucket> {
    let mut out = Vec::new();
    match granularity {
        Granularity::Day => {
            let mut day = start.date_naive();
            while midnight(day) < end {
                let next = day + Duration::days(1);
                out.push(SeriesBucket::new(midnight(day), midnight(next), granularity));
                day = next;
            }
        }
        Granularity::Month => {
            let mut month = month_start(start);
            while midnight(month) < end {
                let next = next_month(month);
                if next <= month {
                    break;
                }
                out.push(SeriesBucket::new(midnight(month), midnight(next), granularity));
                month = next;
            }
        }
    }
    out
}

/// Paid, pending and failed amounts per bucket over `[start, end)`.
///
/// Buckets are labelled by their whole day or month, but the first and last
/// are clipped to the window, so nothing outside `[start, end)` is counted.
pub fn revenue_series(
    transactions: &[Transaction],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<SeriesBucket> {
    let mut out = buckets(start, end, Granularity::for_window(start, end));
    if let Some(first) = out.first_mut() {
        first.start = first.start.max(start);
    }
    if let Some(last) = out.last_mut() {
        last.end = last.end.min(end);
    }

    for tx in transactions {
        let at = tx.effective_date();
        // Buckets are sorted and contiguous: the candidate is the last one
        // starting at or before `at`
        let idx = out.partition_point(|bucket| bucket.start <= at);
        let Some(bucket) = idx.checked_sub(1).and_then(|i| out.get_mut(i)) else {
            continue;
        };
        if !bucket.contains(at) {
            continue;
        }
        match tx.status {
            TransactionStatus::Paid => bucket.paid += tx.amount,
            TransactionStatus::Pending => bucket.pending += tx.amount,
            TransactionStatus::Failed => bucket.failed += tx.amount,
            TransactionStatus::Refunded => {}
        }
    }
    out
}

/// Series for the last `days` days up to and including today.
pub fn recent_revenue(transactions: &[Transaction], days: u32, now: DateTime<Utc>) -> Vec<SeriesBucket> {
    let end = midnight(now.date_naive() + Duration::days(1));
    let start = end - Duration::days(i64::from(days.max(1)));
    revenue_series(transactions, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethod;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn tx(id: &str, when: DateTime<Utc>, amount: f64, status: TransactionStatus) -> Transaction {
        Transaction {
            id: id.to_string(),
            person_id: "p1".to_string(),
            subscription_id: None,
            amount,
            status,
            method: PaymentMethod::Cash,
            paid_at: Some(when),
            created_at: when,
            notes: None,
        }
    }

    #[test]
    fn test_monthly_buckets_do_not_double_count() {
        let txs = vec![
            tx("a", at(2024, 1, 5), 100.0, TransactionStatus::Paid),
            tx("b", at(2024, 2, 10), 50.0, TransactionStatus::Paid),
        ];
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        let series = revenue_series(&txs, start, end);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Jan 2024");
        assert_eq!(series[0].paid, 100.0);
        assert_eq!(series[1].label, "Feb 2024");
        assert_eq!(series[1].paid, 50.0);
        assert_eq!(series.iter().map(|b| b.paid).sum::<f64>(), 150.0);
    }

    #[test]
    fn test_partial_months_are_clipped_to_the_window() {
        let now = at(2024, 3, 15);
        let txs = vec![
            tx("before", at(2024, 1, 5), 100.0, TransactionStatus::Paid),
            tx("inside", at(2024, 1, 20), 30.0, TransactionStatus::Paid),
            tx("today", at(2024, 3, 15), 10.0, TransactionStatus::Paid),
        ];

        let series = recent_revenue(&txs, 60, now);
        let window_start = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
        let window_end = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].label, "Jan 2024");
        assert_eq!(series[0].start, window_start);
        assert_eq!(series[0].paid, 30.0);
        assert_eq!(series[2].end, window_end);
        assert_eq!(series[2].paid, 10.0);
        assert_eq!(series.iter().map(|b| b.paid).sum::<f64>(), 40.0);
    }

    #[test]
    fn test_bucket_boundaries_are_half_open() {
        let feb_first = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let txs = vec![tx("edge", feb_first, 25.0, TransactionStatus::Paid)];
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        let series = revenue_series(&txs, start, end);
        assert_eq!(series[0].paid, 0.0);
        assert_eq!(series[1].paid, 25.0);
    }

    #[test]
    fn test_daily_series_splits_statuses() {
        let now = at(2024, 3, 15);
        let txs = vec![
            tx("a", at(2024, 3, 15), 40.0, TransactionStatus::Paid),
            tx("b", at(2024, 3, 15), 15.0, TransactionStatus::Pending),
            tx("c", at(2024, 3, 14), 60.0, TransactionStatus::Failed),
            tx("d", at(2024, 3, 14), 99.0, TransactionStatus::Refunded),
            tx("old", at(2024, 1, 1), 500.0, TransactionStatus::Paid),
        ];

        let series = recent_revenue(&txs, 7, now);
        assert_eq!(series.len(), 7);
        let today = &series[6];
        assert_eq!(today.label, "Mar 15");
        assert_eq!((today.paid, today.pending, today.failed), (40.0, 15.0, 0.0));
        let yesterday = &series[5];
        assert_eq!(yesterday.failed, 60.0);
        assert_eq!(yesterday.total(), 60.0);
        assert_eq!(series.iter().map(SeriesBucket::total).sum::<f64>(), 115.0);
    }

    #[test]
    fn test_granularity_threshold() {
        let start = at(2024, 1, 1);
        assert_eq!(Granularity::for_window(start, start + Duration::days(30)), Granularity::Day);
        assert_eq!(Granularity::for_window(start, start + Duration::days(31)), Granularity::Month);
        let year = buckets(start, start + Duration::days(365), Granularity::Month);
        assert_eq!(year.len(), 12);
        assert_eq!(year[11].label, "Dec 2024");
    }
}
