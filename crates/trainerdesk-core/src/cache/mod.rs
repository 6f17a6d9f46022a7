//! In-memory cache slots for resource kinds.
//!
//! This module provides the `CacheStore` holding one `{data, timestamp}`
//! slot per resource kind. Volatile resources go stale after 2 minutes,
//! the role classification after 5.

pub mod store;

pub use store::{CacheAges, CacheStore, CachedData, TtlPolicy, LONG_TTL, SHORT_TTL};
