//! Retry, guarded writes and the user-facing refresh.

pub mod mutations;
pub mod retry;
pub mod smart_refresh;

pub use mutations::{MutationError, Mutations, ValidationError};
pub use retry::{with_backoff, Attempted, RetryPolicy, Transient};
pub use smart_refresh::{smart_refresh, SmartRefreshOutcome, SmartRefreshSummary};
