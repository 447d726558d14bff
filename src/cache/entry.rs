//! A single slot in the TTL cache.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

/// A computation shared by every caller that asked for the same key while it was running.
pub(crate) type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// The in-flight computation registered for a key.
pub(crate) struct PendingFlight<V, E> {
  /// Distinguishes this flight from later ones for the same key
  pub id: u64,
  pub flight: Flight<V, E>,
}

/// Where a lookup got its answer from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
  /// A cached value, returned already resolved
  Value,
  /// An in-flight computation that the caller attached to
  Pending,
}

pub(crate) struct CacheEntry<V, E> {
  pub expiry: Instant,
  pub value: Option<V>,
  pub pending: Option<PendingFlight<V, E>>,
}

impl<V, E> CacheEntry<V, E> {
  pub fn is_fresh(&self, now: Instant) -> bool {
    now <= self.expiry
  }

  /// Whether `id` is the flight currently registered here.
  pub fn is_flight(&self, id: u64) -> bool {
    self.pending.as_ref().is_some_and(|p| p.id == id)
  }
}

impl<V, E> CacheEntry<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// An entry holding a settled value.
  pub fn resolved(value: V, expiry: Instant) -> Self {
    Self {
      expiry,
      value: Some(value),
      pending: None,
    }
  }

  /// An entry holding only an in-flight computation.
  pub fn pending(id: u64, flight: Flight<V, E>, expiry: Instant) -> Self {
    Self {
      expiry,
      value: None,
      pending: Some(PendingFlight { id, flight }),
    }
  }

  /// Hand out the entry's result. A pending flight wins over a stored value so that a
  /// forced refresh is observed by every reader.
  pub fn lookup(&self) -> Option<(EntrySource, BoxFuture<'static, Result<V, E>>)> {
    if let Some(pending) = &self.pending {
      return Some((EntrySource::Pending, pending.flight.clone().boxed()));
    }

    self
      .value
      .clone()
      .map(|value| (EntrySource::Value, future::ready(Ok(value)).boxed()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_freshness_is_inclusive_of_expiry() {
    let now = Instant::now();
    let entry: CacheEntry<u32, String> = CacheEntry::resolved(7, now);

    assert!(entry.is_fresh(now));
    assert!(!entry.is_fresh(now + Duration::from_millis(1)));
  }

  #[tokio::test]
  async fn test_lookup_prefers_pending_flight() {
    let now = Instant::now();
    let flight = future::ready(Ok::<u32, String>(2)).boxed().shared();
    let mut entry = CacheEntry::pending(1, flight, now);
    entry.value = Some(1);

    let (source, fut) = entry.lookup().unwrap();
    assert_eq!(source, EntrySource::Pending);
    assert_eq!(fut.await, Ok(2));
    assert!(entry.is_flight(1));
    assert!(!entry.is_flight(2));
  }

  #[tokio::test]
  async fn test_lookup_resolved_value() {
    let entry: CacheEntry<u32, String> = CacheEntry::resolved(5, Instant::now());

    let (source, fut) = entry.lookup().unwrap();
    assert_eq!(source, EntrySource::Value);
    assert_eq!(fut.await, Ok(5));
  }
}
