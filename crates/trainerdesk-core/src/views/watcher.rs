use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::trace;

use crate::models::{PaymentMetrics, Person, Plan, ResourceData, Subscription, Transaction};
use crate::state::AppState;

use super::Dashboard;

/// The collections a dashboard is computed from, held by `Arc` so a
/// replacement is detected by pointer rather than by comparing contents.
#[derive(Clone, Default)]
struct Inputs {
    persons: Option<Arc<Vec<Person>>>,
    plans: Option<Arc<Vec<Plan>>>,
    subscriptions: Option<Arc<Vec<Subscription>>>,
    transactions: Option<Arc<Vec<Transaction>>>,
    metrics: Option<Arc<PaymentMetrics>>,
}

fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl Inputs {
    fn of(data: &ResourceData) -> Self {
        Self {
            persons: data.persons.clone(),
            plans: data.plans.clone(),
            subscriptions: data.subscriptions.clone(),
            transactions: data.transactions.clone(),
            metrics: data.payment_metrics.clone(),
        }
    }

    fn same_as(&self, other: &Inputs) -> bool {
        same(&self.persons, &other.persons)
            && same(&self.plans, &other.plans)
            && same(&self.subscriptions, &other.subscriptions)
            && same(&self.transactions, &other.transactions)
            && same(&self.metrics, &other.metrics)
    }
}

/// Keeps a `Dashboard` in step with the store.
///
/// Loading flags, errors, cache timestamps and re-fetches that return the
/// collection already held do not cause a recomputation.
pub struct DashboardWatcher {
    rx: watch::Receiver<AppState>,
    inputs: Option<Inputs>,
    current: Option<Arc<Dashboard>>,
    recomputed: u64,
}

impl DashboardWatcher {
    pub fn new(rx: watch::Receiver<AppState>) -> Self {
        Self {
            rx,
            inputs: None,
            current: None,
            recomputed: 0,
        }
    }

    /// How many times the dashboard has been computed
    pub fn recomputations(&self) -> u64 {
        self.recomputed
    }

    /// Dashboard for the latest state, recomputed only if an input changed.
    pub fn current(&mut self, now: DateTime<Utc>) -> Arc<Dashboard> {
        let (inputs, data) = {
            let state = self.rx.borrow_and_update();
            (Inputs::of(&state.data), state.data.clone())
        };

        if let (Some(previous), Some(dashboard)) = (&self.inputs, &self.current) {
            if previous.same_as(&inputs) {
                return Arc::clone(dashboard);
            }
        }

        trace!("Recomputing dashboard");
        let dashboard = Arc::new(Dashboard::compute(&data, now));
        self.inputs = Some(inputs);
        self.current = Some(Arc::clone(&dashboard));
        self.recomputed += 1;
        dashboard
    }

    /// Wait for the next state change that replaces an input, and return the
    /// recomputed dashboard. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Arc<Dashboard>> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let unchanged = {
                let state = self.rx.borrow_and_update();
                let inputs = Inputs::of(&state.data);
                self.inputs
                    .as_ref()
                    .is_some_and(|previous| previous.same_as(&inputs))
            };
            if !unchanged {
                return Some(self.current(Utc::now()));
            }
        }
    }
}
