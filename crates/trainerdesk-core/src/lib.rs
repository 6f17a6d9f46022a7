//! Trainerdesk core - the client-side data engine behind the trainer and
//! student payment apps.
//!
//! It keeps an in-memory, TTL-aware cache of the resources a signed-in
//! identity may see, refreshes them from the remote service with role
//! scoping and single-flight cancellation, retries writes with backoff, and
//! derives the payment views the screens render.
//!
//! Front ends own a [`SyncEngine`], feed it [`SessionEvent`]s and read
//! [`AppState`] snapshots or [`Dashboard`]s from it.

pub mod auth;
pub mod cache;
pub mod config;
pub mod engine;
pub mod models;
pub mod notify;
pub mod remote;
pub mod resilience;
pub mod state;
pub mod sync;
pub mod utils;
pub mod views;

#[cfg(test)]
mod test_support;

pub use auth::{SessionData, SessionEvent};
pub use config::{Config, SyncSettings};
pub use engine::SyncEngine;
pub use models::{ResourceKind, Role};
pub use notify::{Notification, Notifier, NotifyLevel, TracingNotifier};
pub use remote::{RemoteError, RemoteService, RestClient};
pub use state::AppState;
pub use sync::{RefreshOutcome, SyncError};
pub use views::Dashboard;
