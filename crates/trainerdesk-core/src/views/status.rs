//! Per-subject payment status.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    MembershipStatus, Person, Plan, ResourceData, Subscription, TransactionStatus,
};

/// Days of membership left above which a subject counts as paid up
const PAID_AHEAD_DAYS: i64 = 7;
/// Days since the last payment after which a subject is overdue
const OVERDUE_AFTER_DAYS: i64 = 30;
/// Days since the last payment from which the next one is due soon
const DUE_SOON_AFTER_DAYS: i64 = 26;
/// A payment at most this many days old counts as current
const RECENT_PAYMENT_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Overdue,
    DueSoon,
    Paid,
    Inactive,
}

impl PaymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::DueSoon => "Due soon",
            PaymentStatus::Overdue => "Overdue",
            PaymentStatus::Inactive => "Inactive",
        }
    }

    /// Money is (or will shortly be) owed
    pub fn is_outstanding(&self) -> bool {
        matches!(self, PaymentStatus::DueSoon | PaymentStatus::Overdue)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The facts about one subject that decide their status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusInput {
    /// `None` when the subject never had a membership
    pub membership: Option<MembershipStatus>,
    pub expiry: Option<DateTime<Utc>>,
    pub plan_price: Option<f64>,
    pub has_paid_transaction: bool,
    /// Latest of the recorded last payment date and the latest paid
    /// transaction
    pub last_payment: Option<DateTime<Utc>>,
}

/// Whole calendar days from `from` to `to` (negative when `to` is earlier)
fn calendar_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.date_naive() - from.date_naive()).num_days()
}

/// Classify one subject. Rules are checked in priority order.
pub fn classify(input: &StatusInput, now: DateTime<Utc>) -> PaymentStatus {
    if input.membership.is_none() && input.last_payment.is_none() {
        return PaymentStatus::Inactive;
    }

    match input.membership {
        Some(MembershipStatus::Active) => {
            let charges = input.plan_price.is_some_and(|price| price > 0.0);
            if charges && !input.has_paid_transaction {
                return PaymentStatus::DueSoon;
            }
            return match input.expiry {
                Some(expiry) => {
                    let remaining = calendar_days(now, expiry);
                    if remaining > PAID_AHEAD_DAYS {
                        PaymentStatus::Paid
                    } else if remaining >= 1 {
                        PaymentStatus::DueSoon
                    } else {
                        PaymentStatus::Overdue
                    }
                }
                None => PaymentStatus::Paid,
            };
        }
        Some(MembershipStatus::Expired) => return PaymentStatus::Overdue,
        Some(MembershipStatus::ExpiringSoon) => return PaymentStatus::DueSoon,
        Some(MembershipStatus::Inactive) | None => {}
    }

    match input.last_payment {
        Some(paid) => {
            let since = calendar_days(paid, now);
            if since > OVERDUE_AFTER_DAYS {
                PaymentStatus::Overdue
            } else if since >= DUE_SOON_AFTER_DAYS {
                PaymentStatus::DueSoon
            } else if since <= RECENT_PAYMENT_DAYS {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Inactive
            }
        }
        None => PaymentStatus::Inactive,
    }
}

/// One row of the payments overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SubjectStatus {
    pub person_id: String,
    pub name: String,
    pub status: PaymentStatus,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    /// Plan price owed when the status is outstanding, otherwise zero
    pub amount_due: f64,
    pub expiry: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub last_payment: Option<DateTime<Utc>>,
    pub paid_total: f64,
    pub paid_this_month: f64,
    pub pending_total: f64,
    pub has_current_subscription: bool,
}

#[derive(Default)]
struct Ledger {
    last_paid: Option<DateTime<Utc>>,
    paid_total: f64,
    paid_this_month: f64,
    pending_total: f64,
    any_paid: bool,
}

/// Lookup tables built once per computation so each subject is O(1).
struct StatusIndex<'a> {
    plans: HashMap<&'a str, &'a Plan>,
    latest_subscription: HashMap<&'a str, &'a Subscription>,
    ledgers: HashMap<&'a str, Ledger>,
}

impl<'a> StatusIndex<'a> {
    fn build(data: &'a ResourceData, now: DateTime<Utc>) -> Self {
        let plans = data.plans().iter().map(|p| (p.id.as_str(), p)).collect();

        let mut latest_subscription: HashMap<&str, &Subscription> = HashMap::new();
        for sub in data.subscriptions() {
            latest_subscription
                .entry(sub.person_id.as_str())
                .and_modify(|current| {
                    if sub.start_date > current.start_date {
                        *current = sub;
                    }
                })
                .or_insert(sub);
        }

        let mut ledgers: HashMap<&str, Ledger> = HashMap::new();
        for tx in data.transactions() {
            let ledger = ledgers.entry(tx.person_id.as_str()).or_default();
            match tx.status {
                TransactionStatus::Paid => {
                    let when = tx.effective_date();
                    ledger.any_paid = true;
                    ledger.paid_total += tx.amount;
                    if when.year() == now.year() && when.month() == now.month() {
                        ledger.paid_this_month += tx.amount;
                    }
                    if ledger.last_paid.map_or(true, |last| when > last) {
                        ledger.last_paid = Some(when);
                    }
                }
                TransactionStatus::Pending => ledger.pending_total += tx.amount,
                TransactionStatus::Failed | TransactionStatus::Refunded => {}
            }
        }

        Self {
            plans,
            latest_subscription,
            ledgers,
        }
    }

    fn subject_status(&self, person: &Person, now: DateTime<Utc>) -> SubjectStatus {
        let subscription = self.latest_subscription.get(person.id.as_str()).copied();
        let ledger = self.ledgers.get(person.id.as_str());

        let (membership, expiry) = match subscription {
            Some(sub) => (Some(sub.status.as_membership()), sub.end_date),
            None => (person.membership_status, person.membership_expiry),
        };
        let plan_id = subscription
            .map(|sub| sub.plan_id.as_str())
            .or(person.plan_id.as_deref());
        let plan = plan_id.and_then(|id| self.plans.get(id).copied());

        let last_payment = match (person.last_payment_date, ledger.and_then(|l| l.last_paid)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let input = StatusInput {
            membership,
            expiry,
            plan_price: plan.map(|p| p.price),
            has_paid_transaction: ledger.is_some_and(|l| l.any_paid),
            last_payment,
        };
        let status = classify(&input, now);

        SubjectStatus {
            person_id: person.id.clone(),
            name: person.display_name().to_string(),
            status,
            plan_id: plan_id.map(str::to_string),
            plan_name: plan.map(|p| p.name.clone()),
            amount_due: if status.is_outstanding() {
                plan.map_or(0.0, |p| p.price)
            } else {
                0.0
            },
            expiry,
            days_until_expiry: expiry.map(|e| calendar_days(now, e)),
            last_payment,
            paid_total: ledger.map_or(0.0, |l| l.paid_total),
            paid_this_month: ledger.map_or(0.0, |l| l.paid_this_month),
            pending_total: ledger.map_or(0.0, |l| l.pending_total),
            has_current_subscription: subscription.is_some_and(Subscription::is_current),
        }
    }
}

/// Status of every subject in `data`.
///
/// Subjects are the loaded people. A student session has no people list, so
/// the subjects are then whoever the subscriptions and transactions refer to.
pub fn subject_statuses(data: &ResourceData, now: DateTime<Utc>) -> Vec<SubjectStatus> {
    let index = StatusIndex::build(data, now);

    if data.persons.is_some() {
        return data
            .persons()
            .iter()
            .map(|person| index.subject_status(person, now))
            .collect();
    }

    let mut ids: Vec<&str> = data
        .subscriptions()
        .iter()
        .map(|s| s.person_id.as_str())
        .chain(data.transactions().iter().map(|t| t.person_id.as_str()))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .map(|id| index.subject_status(&Person::new(id, id), now))
        .collect()
}
