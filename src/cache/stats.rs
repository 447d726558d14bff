//! Cache statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  /// Entries currently held, fresh or not
  pub entries: usize,
  /// Entries with a computation in flight
  pub pending: usize,
  /// Entries past their expiry that have not been evicted yet
  pub expired: usize,
  /// Lookups answered from a stored value
  pub hits: u64,
  /// Lookups that attached to an in-flight computation
  pub coalesced: u64,
  /// Lookups that started a new computation
  pub misses: u64,
  /// Computations that settled with an error
  pub failures: u64,
}

/// Lifetime counters, updated without holding the entry lock.
#[derive(Debug, Default)]
pub(crate) struct Counters {
  hits: AtomicU64,
  coalesced: AtomicU64,
  misses: AtomicU64,
  failures: AtomicU64,
}

impl Counters {
  pub fn hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  pub fn coalesced(&self) {
    self.coalesced.fetch_add(1, Ordering::Relaxed);
  }

  pub fn miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub fn failure(&self) {
    self.failures.fetch_add(1, Ordering::Relaxed);
  }

  /// Fill in the counter half of a stats snapshot.
  pub fn snapshot(&self, entries: usize, pending: usize, expired: usize) -> CacheStats {
    CacheStats {
      entries,
      pending,
      expired,
      hits: self.hits.load(Ordering::Relaxed),
      coalesced: self.coalesced.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      failures: self.failures.load(Ordering::Relaxed),
    }
  }
}
