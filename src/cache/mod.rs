//! In-memory response cache.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Maps string keys (endpoint plus parameters) to cached values with a TTL
//! - Coalesces concurrent requests for the same key into a single computation
//! - Never caches failures, so the next caller retries
//! - Supports invalidation by exact key or by key prefix

mod entry;
mod stats;
mod ttl;

pub use stats::CacheStats;
pub use ttl::TtlCache;
