use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{ResourceKind, ResourcePayload};

/// TTL for volatile resources (people, plans, subscriptions, transactions,
/// metrics, settings).
pub const SHORT_TTL: Duration = Duration::from_secs(2 * 60);

/// TTL for the slow-changing authorization fact.
pub const LONG_TTL: Duration = Duration::from_secs(5 * 60);

/// Time-to-live windows per TTL class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub short: Duration,
    pub long: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            short: SHORT_TTL,
            long: LONG_TTL,
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::RoleStatus => self.long,
            _ => self.short,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// Fetch generation that produced this value, when it came from a
    /// sequenced fetch
    pub generation: Option<u64>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now())
    }

    pub fn at(data: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            data,
            cached_at,
            generation: None,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        self.age_minutes_at(Utc::now())
    }

    pub fn age_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        self.age_display_at(Utc::now())
    }

    pub fn age_display_at(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_minutes_at(now);
        if minutes < 1 {
            // Also covers negative ages from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Stale iff strictly older than `ttl`. A timestamp in the future
    /// (clock skew) counts as fresh.
    pub fn is_stale_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.cached_at).to_std() {
            Ok(age) => age > ttl,
            Err(_) => false,
        }
    }
}

/// Per-resource-kind cache slots plus the TTL policy that judges them.
///
/// Only the reducer mutates a `CacheStore`; everything else reads it from a
/// state snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheStore {
    policy: TtlPolicy,
    slots: BTreeMap<ResourceKind, CachedData<ResourcePayload>>,
    /// Highest fetch generation recorded per kind. Survives `clear`.
    watermarks: BTreeMap<ResourceKind, u64>,
}

impl CacheStore {
    pub fn new(policy: TtlPolicy) -> Self {
        Self {
            policy,
            slots: BTreeMap::new(),
            watermarks: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> TtlPolicy {
        self.policy
    }

    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        self.policy.ttl_for(kind)
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&CachedData<ResourcePayload>> {
        self.slots.get(&kind)
    }

    pub fn is_stale(&self, kind: ResourceKind) -> bool {
        self.is_stale_at(kind, Utc::now())
    }

    pub fn is_stale_at(&self, kind: ResourceKind, now: DateTime<Utc>) -> bool {
        match self.slots.get(&kind) {
            Some(slot) => slot.is_stale_at(self.ttl_for(kind), now),
            None => true,
        }
    }

    /// Store `payload` under its kind with `cached_at = now`.
    pub fn set(&mut self, payload: ResourcePayload, now: DateTime<Utc>) {
        self.record(payload, now, None);
    }

    pub fn record(&mut self, payload: ResourcePayload, now: DateTime<Utc>, generation: Option<u64>) {
        let kind = payload.kind();
        if let Some(generation) = generation {
            let mark = self.watermarks.entry(kind).or_insert(generation);
            *mark = (*mark).max(generation);
        }
        let mut slot = CachedData::at(payload, now);
        slot.generation = generation;
        self.slots.insert(kind, slot);
    }

    /// Newest fetch generation ever recorded for `kind`, even if the slot
    /// has since been cleared
    pub fn generation(&self, kind: ResourceKind) -> Option<u64> {
        self.watermarks.get(&kind).copied()
    }

    /// Reset every slot to absent. Generation watermarks are kept so a late
    /// reply from an older fetch still loses to a newer one.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Kinds out of `kinds` that are still within their TTL
    pub fn fresh_kinds_at(&self, kinds: &[ResourceKind], now: DateTime<Utc>) -> Vec<ResourceKind> {
        kinds
            .iter()
            .copied()
            .filter(|&kind| !self.is_stale_at(kind, now))
            .collect()
    }

    pub fn ages_at(&self, now: DateTime<Utc>) -> CacheAges {
        let entries = self
            .slots
            .iter()
            .map(|(&kind, slot)| (kind, slot.age_display_at(now)))
            .collect();
        let last_updated = self
            .slots
            .values()
            .max_by_key(|slot| slot.cached_at)
            .map(|slot| slot.age_display_at(now));
        CacheAges {
            entries,
            last_updated,
        }
    }
}

/// Human-readable age of each cache slot, for status lines and diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheAges {
    pub entries: BTreeMap<ResourceKind, String>,
    last_updated: Option<String>,
}

impl CacheAges {
    pub fn age_of(&self, kind: ResourceKind) -> String {
        self.entries
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }

    /// Age of the most recently refreshed slot
    pub fn last_updated(&self) -> String {
        self.last_updated
            .clone()
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
