use crate::auth::SessionData;
use crate::models::{ResourcePayload, Role};

use super::LoadingConcern;

/// Every state transition the reducer understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Identity became available, rotated its token, or went away
    SetAuth(Option<SessionData>),
    /// Role classification resolved; also stamps the long-TTL slot
    SetRoleStatus(Role),
    SetLoading(LoadingConcern, bool),
    /// Replace a resource and its cache slot in one transition.
    ///
    /// A `generation` older than the slot's current one is ignored so a slow
    /// response cannot overwrite a newer one. `None` always applies.
    SetResource {
        payload: ResourcePayload,
        generation: Option<u64>,
    },
    SetError(Option<String>),
    /// Forget every cache timestamp; keep the data for rendering
    ClearCache,
}

impl Action {
    /// Unsequenced resource update
    pub fn set_resource(payload: impl Into<ResourcePayload>) -> Self {
        Action::SetResource {
            payload: payload.into(),
            generation: None,
        }
    }

    pub fn set_error(message: impl Into<String>) -> Self {
        Action::SetError(Some(message.into()))
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetAuth(_) => "set-auth",
            Action::SetRoleStatus(_) => "set-role-status",
            Action::SetLoading(..) => "set-loading",
            Action::SetResource { .. } => "set-resource",
            Action::SetError(_) => "set-error",
            Action::ClearCache => "clear-cache",
        }
    }
}
