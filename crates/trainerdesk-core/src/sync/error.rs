use thiserror::Error;

use crate::models::ResourceKind;
use crate::remote::RemoteError;

/// One resource kind that could not be refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub kind: ResourceKind,
    pub error: RemoteError,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.error)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("No active session")]
    NoSession,

    #[error("Role check failed: {0}")]
    RoleCheck(RemoteError),

    #[error("{} of the requested resources failed to load: {}", .failures.len(), summarize(.failures))]
    Fetch {
        failures: Vec<FetchFailure>,
        /// Kinds that did load and were folded despite the failures
        fetched: Vec<ResourceKind>,
    },
}

fn summarize(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl SyncError {
    /// Every underlying failure is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::NoSession => false,
            SyncError::RoleCheck(e) => e.is_transient(),
            SyncError::Fetch { failures, .. } => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_transient())
            }
        }
    }

    /// Kinds to request again on retry
    pub fn failed_kinds(&self) -> Vec<ResourceKind> {
        match self {
            SyncError::Fetch { failures, .. } => failures.iter().map(|f| f.kind).collect(),
            _ => Vec::new(),
        }
    }

    /// Message for the single `SetError` a failed refresh leaves behind
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NoSession => "Not signed in.".to_string(),
            SyncError::RoleCheck(e) => e.user_message(),
            SyncError::Fetch { failures, .. } => match failures.first() {
                Some(first) => format!("{}: {}", first.kind.label(), first.error.user_message()),
                None => self.to_string(),
            },
        }
    }
}
