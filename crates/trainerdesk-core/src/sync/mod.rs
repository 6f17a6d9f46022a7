//! Keeping the store in step with the remote service.
//!
//! - `Orchestrator`: staleness-driven, single-flight, cancellable bulk
//!   refresh with a role check in front of it
//! - `SessionGate`: lets a bulk refresh start on its own at most once per
//!   session establishment

pub mod error;
pub mod orchestrator;
pub mod session_gate;

pub use error::{FetchFailure, SyncError};
pub use orchestrator::{Orchestrator, RefreshOutcome, RefreshReport, DEFAULT_REFRESH_TIMEOUT};
pub use session_gate::{AutoFetch, SessionGate};
