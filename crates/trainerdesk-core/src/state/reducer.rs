//! The reducer: the only place aggregate state changes.

use chrono::{DateTime, Utc};

use crate::models::ResourcePayload;

use super::{Action, AppState};

/// Apply `action` to `state` as of `now`.
///
/// Total and pure: no I/O, no panics, and the result depends only on the
/// arguments.
pub fn reduce(mut state: AppState, action: Action, now: DateTime<Utc>) -> AppState {
    match action {
        Action::SetAuth(session) => {
            let same_identity = match (&state.session, &session) {
                (Some(current), Some(next)) => current.same_identity(next),
                _ => false,
            };
            if !same_identity {
                // New identity or sign-out: nothing of the previous scope survives
                let auth_loading = state.loading.auth;
                state = AppState::new(state.cache.policy());
                state.loading.auth = auth_loading;
            }
            state.session = session;
        }
        Action::SetRoleStatus(role) => {
            state.role = Some(role);
            state.cache.set(ResourcePayload::RoleStatus(role), now);
        }
        Action::SetLoading(concern, value) => {
            state.loading.set(concern, value);
        }
        Action::SetResource {
            payload,
            generation,
        } => {
            let kind = payload.kind();
            if let (Some(incoming), Some(current)) = (generation, state.cache.generation(kind)) {
                if incoming < current {
                    return state;
                }
            }
            if let ResourcePayload::RoleStatus(role) = payload {
                state.role = Some(role);
            }
            state.data.apply(payload.clone());
            state.cache.record(payload, now, generation);
        }
        Action::SetError(message) => {
            state.error = message;
        }
        Action::ClearCache => {
            state.cache.clear();
        }
    }
    state
}

// ============================================================================
// Tests
// ============================================================================
