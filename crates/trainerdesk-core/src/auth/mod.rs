//! Session types at the identity-provider boundary.
//!
//! Authentication itself happens elsewhere; this module only describes the
//! identity handed to the engine (`SessionData`) and the events
//! (`SessionEvent`) that gate when fetching starts and stops.

pub mod session;

pub use session::{SessionData, SessionEvent};
