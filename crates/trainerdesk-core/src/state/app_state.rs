use chrono::{DateTime, Utc};

use crate::auth::SessionData;
use crate::cache::{CacheStore, TtlPolicy};
use crate::models::{ResourceData, ResourceKind, Role};

/// Concerns that carry their own loading indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingConcern {
    Auth,
    BulkData,
    RoleCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingFlags {
    pub auth: bool,
    pub bulk_data: bool,
    pub role_check: bool,
}

impl LoadingFlags {
    pub fn get(&self, concern: LoadingConcern) -> bool {
        match concern {
            LoadingConcern::Auth => self.auth,
            LoadingConcern::BulkData => self.bulk_data,
            LoadingConcern::RoleCheck => self.role_check,
        }
    }

    pub fn set(&mut self, concern: LoadingConcern, value: bool) {
        match concern {
            LoadingConcern::Auth => self.auth = value,
            LoadingConcern::BulkData => self.bulk_data = value,
            LoadingConcern::RoleCheck => self.role_check = value,
        }
    }

    pub fn any(&self) -> bool {
        self.auth || self.bulk_data || self.role_check
    }
}

/// The single source of truth for one session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub session: Option<SessionData>,
    pub role: Option<Role>,
    pub data: ResourceData,
    pub cache: CacheStore,
    pub loading: LoadingFlags,
    pub error: Option<String>,
}

impl AppState {
    pub fn new(policy: TtlPolicy) -> Self {
        Self {
            cache: CacheStore::new(policy),
            ..Default::default()
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn is_stale(&self, kind: ResourceKind) -> bool {
        self.cache.is_stale(kind)
    }

    pub fn is_stale_at(&self, kind: ResourceKind, now: DateTime<Utc>) -> bool {
        self.cache.is_stale_at(kind, now)
    }

    /// Whether the role must be (re)resolved before a scoped fetch
    pub fn role_needs_check_at(&self, now: DateTime<Utc>) -> bool {
        self.role.is_none() || self.cache.is_stale_at(ResourceKind::RoleStatus, now)
    }
}
