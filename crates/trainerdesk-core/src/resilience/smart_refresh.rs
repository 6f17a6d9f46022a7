//! User-initiated refresh: always forced, retried, and reported.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::cache::CacheAges;
use crate::models::{ResourceKind, Role};
use crate::notify::{Notification, Notifier};
use crate::remote::RemoteService;
use crate::sync::{Orchestrator, RefreshOutcome, SyncError};

use super::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum SmartRefreshOutcome {
    Refreshed,
    /// Torn down (sign-out, identity change) before it finished
    Cancelled,
    TimedOut,
    /// Gave up; carries the message shown to the user
    Failed(String),
}

/// What a smart refresh did, for diagnostics and status lines.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartRefreshSummary {
    /// Kinds fetched and folded, over all attempts
    pub fetched: Vec<ResourceKind>,
    /// Kinds whose cache was still fresh before the refresh; a non-forced
    /// refresh would have served them from cache
    pub previously_fresh: Vec<ResourceKind>,
    /// Cache ages as they were before the refresh
    pub previous_ages: CacheAges,
    pub attempts: u32,
    pub elapsed: Duration,
    pub outcome: SmartRefreshOutcome,
}

impl SmartRefreshSummary {
    pub fn succeeded(&self) -> bool {
        self.outcome == SmartRefreshOutcome::Refreshed
    }
}

/// Force-refresh everything the role can see. Transient failures are retried
/// under `policy`, re-fetching only the kinds that failed; the user hears
/// about the result exactly once.
pub async fn smart_refresh<R: RemoteService, N: Notifier + ?Sized>(
    orchestrator: &Orchestrator<R>,
    notifier: &N,
    policy: &RetryPolicy,
    show_progress: bool,
) -> SmartRefreshSummary {
    let started = Instant::now();
    let now = Utc::now();
    let (previous_ages, previously_fresh) = orchestrator.store().read(|state| {
        let kinds: Vec<ResourceKind> = match state.role {
            Some(role) => role.resource_set().to_vec(),
            None => Role::Administrator.resource_set().to_vec(),
        };
        (state.cache.ages_at(now), state.cache.fresh_kinds_at(&kinds, now))
    });

    if show_progress {
        notifier.notify(Notification::info("Refreshing", "Fetching the latest data..."));
    }

    let mut fetched = Vec::new();
    let mut attempts = 0;
    let mut retry_kinds: Option<Vec<ResourceKind>> = None;

    let outcome = loop {
        attempts += 1;
        let result = match &retry_kinds {
            Some(kinds) => orchestrator.refresh_kinds_queued(kinds, true).await,
            None => orchestrator.refresh_all_queued(true).await,
        };

        match result {
            Ok(RefreshOutcome::Completed(report)) => {
                fetched.extend(report.fetched);
                break SmartRefreshOutcome::Refreshed;
            }
            Ok(RefreshOutcome::AlreadyInFlight | RefreshOutcome::Cancelled) => {
                break SmartRefreshOutcome::Cancelled
            }
            Ok(RefreshOutcome::TimedOut) => break SmartRefreshOutcome::TimedOut,
            Err(e) if e.is_transient() && attempts < policy.attempts() => {
                let delay = policy.delay_for(attempts - 1);
                warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, error = %e, "Refresh failed, retrying");
                if let SyncError::Fetch { failures, fetched: folded } = &e {
                    fetched.extend(folded.iter().copied());
                    retry_kinds = Some(failures.iter().map(|f| f.kind).collect());
                }
                tokio::time::sleep(delay).await;
            }
            Err(e) => break SmartRefreshOutcome::Failed(e.user_message()),
        }
    };

    fetched.sort();
    fetched.dedup();
    let summary = SmartRefreshSummary {
        fetched,
        previously_fresh,
        previous_ages,
        attempts,
        elapsed: started.elapsed(),
        outcome,
    };

    match &summary.outcome {
        SmartRefreshOutcome::Refreshed => {
            info!(
                fetched = summary.fetched.len(),
                attempts = summary.attempts,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Smart refresh complete"
            );
            notifier.notify(Notification::success(
                "Data refreshed",
                format!("Updated {} resources", summary.fetched.len()),
            ));
        }
        SmartRefreshOutcome::TimedOut => {
            notifier.notify(Notification::error(
                "Refresh timed out",
                "Showing the last data we have. Try again in a moment.",
            ));
        }
        SmartRefreshOutcome::Failed(message) => {
            notifier.notify(Notification::error("Refresh failed", message.clone()));
        }
        SmartRefreshOutcome::Cancelled => {
            // Close out the progress notice; a silent cancel stays silent
            if show_progress {
                notifier.notify(Notification::info("Refresh stopped", "The refresh was cancelled."));
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionData;
    use crate::notify::NotifyLevel;
    use crate::remote::RemoteError;
    use crate::state::{Action, Store};
    use crate::sync::DEFAULT_REFRESH_TIMEOUT;
    use crate::test_support::{MockRemote, RecordingNotifier};
    use std::sync::Arc;

    fn orchestrator(remote: MockRemote) -> (Arc<MockRemote>, Orchestrator<MockRemote>) {
        let remote = Arc::new(remote);
        let store = Store::default();
        store.dispatch(Action::SetAuth(Some(SessionData::new("trainer-1", "tok"))));
        let orchestrator = Orchestrator::new(Arc::clone(&remote), store, DEFAULT_REFRESH_TIMEOUT);
        (remote, orchestrator)
    }

    #[tokio::test]
    async fn test_reports_previously_fresh_kinds() {
        let (remote, orchestrator) = orchestrator(MockRemote::new(Role::Administrator));
        orchestrator.refresh_all(false).await.expect("warm");
        let notifier = RecordingNotifier::default();

        let summary =
            smart_refresh(&orchestrator, &notifier, &RetryPolicy::default(), true).await;

        assert!(summary.succeeded());
        assert_eq!(summary.attempts, 1);
        assert_eq!(summary.fetched.len(), 6);
        assert_eq!(summary.previously_fresh.len(), 6);
        assert_eq!(summary.previous_ages.age_of(ResourceKind::Plans), "just now");
        assert_eq!(remote.fetch_calls(), 12);
        assert_eq!(notifier.count(NotifyLevel::Info), 1);
        assert_eq!(notifier.count(NotifyLevel::Success), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_only_failed_kinds() {
        let (remote, orchestrator) = orchestrator(
            MockRemote::new(Role::Administrator).fail_kind_times(
                ResourceKind::Transactions,
                RemoteError::ServerError("db".into()),
                1,
            ),
        );
        let notifier = RecordingNotifier::default();

        let summary =
            smart_refresh(&orchestrator, &notifier, &RetryPolicy::default(), false).await;

        assert!(summary.succeeded());
        assert_eq!(summary.attempts, 2);
        assert!(summary.previously_fresh.is_empty());
        assert_eq!(summary.fetched, Role::Administrator.resource_set().to_vec());
        // Six on the first attempt, then transactions alone
        assert_eq!(remote.fetch_calls(), 7);
        assert_eq!(notifier.all().len(), 1);
        assert!(orchestrator.store().snapshot().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_notifies_once() {
        let (remote, orchestrator) = orchestrator(
            MockRemote::new(Role::Administrator)
                .fail_kind(ResourceKind::Plans, RemoteError::Timeout),
        );
        let notifier = RecordingNotifier::default();

        let summary =
            smart_refresh(&orchestrator, &notifier, &RetryPolicy::default(), false).await;

        assert!(matches!(summary.outcome, SmartRefreshOutcome::Failed(_)));
        assert_eq!(summary.attempts, 3);
        assert_eq!(remote.fetch_calls(), 6 + 1 + 1);
        assert_eq!(notifier.count(NotifyLevel::Error), 1);
        assert_eq!(notifier.all().len(), 1);
        // Everything else still landed
        let state = orchestrator.store().snapshot();
        assert!(state.data.is_loaded(ResourceKind::Persons));
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_waits_for_running_auto_load_then_forces() {
        let (remote, orchestrator) = orchestrator(
            MockRemote::new(Role::Administrator)
                .with_delay(std::time::Duration::from_millis(20)),
        );
        let notifier = RecordingNotifier::default();

        let user_refresh = async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            smart_refresh(&orchestrator, &notifier, &RetryPolicy::default(), true).await
        };
        let (auto_load, summary) = tokio::join!(orchestrator.refresh_all(false), user_refresh);

        assert!(auto_load.expect("auto load").is_completed());
        assert!(summary.succeeded());
        assert_eq!(summary.fetched.len(), 6);
        // Six from the auto-load, six forced afterwards
        assert_eq!(remote.fetch_calls(), 12);
        assert_eq!(notifier.count(NotifyLevel::Info), 1);
        assert_eq!(notifier.count(NotifyLevel::Success), 1);
        assert_eq!(notifier.all().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_closes_progress_notice() {
        let (_remote, orchestrator) = orchestrator(
            MockRemote::new(Role::Administrator)
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let notifier = RecordingNotifier::default();

        let cancel = async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            orchestrator.cancel_all()
        };
        let policy = RetryPolicy::default();
        let (summary, cancelled) = tokio::join!(
            smart_refresh(&orchestrator, &notifier, &policy, true),
            cancel
        );

        assert_eq!(cancelled, 1);
        assert_eq!(summary.outcome, SmartRefreshOutcome::Cancelled);
        assert_eq!(notifier.count(NotifyLevel::Info), 2);
        assert_eq!(notifier.count(NotifyLevel::Error), 0);
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let (remote, orchestrator) = orchestrator(
            MockRemote::new(Role::Administrator).fail_role(RemoteError::Unauthorized),
        );
        let notifier = RecordingNotifier::default();

        let summary =
            smart_refresh(&orchestrator, &notifier, &RetryPolicy::default(), false).await;

        assert_eq!(
            summary.outcome,
            SmartRefreshOutcome::Failed("Session expired. Please log in again.".to_string())
        );
        assert_eq!(summary.attempts, 1);
        assert_eq!(remote.role_calls(), 1);
        assert_eq!(notifier.count(NotifyLevel::Error), 1);
    }
}
