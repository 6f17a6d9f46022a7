//! Aggregate state, the actions that change it, and its owning container.
//!
//! - `AppState`: the single source of truth for a session
//! - `Action`: tagged transitions dispatched by the orchestrator, the
//!   resilience layer and the engine
//! - `reduce`: the pure transition function
//! - `Store`: the shared handle that serializes dispatches and broadcasts
//!   snapshots to subscribers

pub mod action;
pub mod app_state;
pub mod reducer;
pub mod store;

pub use action::Action;
pub use app_state::{AppState, LoadingConcern, LoadingFlags};
pub use reducer::reduce;
pub use store::Store;
