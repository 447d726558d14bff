//! TTL cache with single-flight request coalescing.
//!
//! Every key maps to a stored value, an in-flight computation, or both (while a forced
//! refresh is running). Concurrent callers asking for a key that is being computed attach to
//! the same computation instead of starting another one.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::entry::{CacheEntry, EntrySource, Flight, PendingFlight};
use super::stats::{CacheStats, Counters};

/// TTL used when the caller does not pass one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Longest lifetime an entry gets; larger TTLs are clamped to it (about 30 years).
const MAX_TTL: Duration = Duration::from_secs(86400 * 365 * 30);

/// Expiry `ttl` after `now`, without overflowing `Instant` for huge TTLs.
fn expiry_after(now: Instant, ttl: Duration) -> Instant {
  now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

type Entries<V, E> = HashMap<String, CacheEntry<V, E>>;

/// Process-local TTL cache that deduplicates concurrent computations per key.
///
/// Cloning is cheap and yields a handle to the same cache.
///
/// Values and errors are cloned out to every caller, so both should be cheap to clone
/// (wrap large payloads in an `Arc`). Errors are never cached: a failed computation removes
/// its entry and the next caller starts over.
pub struct TtlCache<V, E> {
  inner: Arc<Inner<V, E>>,
}

struct Inner<V, E> {
  entries: Mutex<Entries<V, E>>,
  default_ttl: Duration,
  next_flight: AtomicU64,
  counters: Counters,
}

impl<V, E> Inner<V, E> {
  fn entries(&self) -> MutexGuard<'_, Entries<V, E>> {
    // Nothing panics while holding the lock, but a poisoned map is still consistent.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<V, E> TtlCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// Create a cache with the default TTL of five minutes.
  pub fn new() -> Self {
    Self::with_default_ttl(DEFAULT_TTL)
  }

  /// Create a cache whose entries live for `ttl` unless a call says otherwise.
  pub fn with_default_ttl(ttl: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        default_ttl: ttl,
        next_flight: AtomicU64::new(0),
        counters: Counters::default(),
      }),
    }
  }

  #[allow(dead_code)]
  pub fn default_ttl(&self) -> Duration {
    self.inner.default_ttl
  }

  /// Look up a key without computing anything.
  ///
  /// Returns `None` if the key is absent or expired (expired entries are evicted). A key with a
  /// computation in flight yields that shared computation.
  #[allow(dead_code)]
  pub fn get(&self, key: &str) -> Option<BoxFuture<'static, Result<V, E>>> {
    let mut entries = self.inner.entries();
    self.lookup_fresh(&mut entries, key, Instant::now())
  }

  /// Store a value with the default TTL.
  #[allow(dead_code)]
  pub fn set(&self, key: impl Into<String>, value: V) {
    self.set_with_ttl(key, value, self.inner.default_ttl);
  }

  /// Store a value, replacing whatever the key held.
  ///
  /// A computation that was in flight for the key keeps running for its callers, but its
  /// result no longer lands in the cache.
  #[allow(dead_code)]
  pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
    let expiry = expiry_after(Instant::now(), ttl);
    self
      .inner
      .entries()
      .insert(key.into(), CacheEntry::resolved(value, expiry));
  }

  /// Return the cached value for `key`, or compute it with `factory` using the default TTL.
  ///
  /// See [`TtlCache::get_or_fetch_with_ttl`].
  pub fn get_or_fetch<F, Fut>(&self, key: &str, factory: F) -> BoxFuture<'static, Result<V, E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    self.get_or_fetch_with_ttl(key, self.inner.default_ttl, factory)
  }

  /// Return the cached value for `key`, or compute it with `factory`.
  ///
  /// 1. A fresh stored value is returned already resolved.
  /// 2. A computation in flight for `key` is shared with this caller.
  /// 3. Otherwise `factory` is invoked exactly once and its future is spawned. The key is
  ///    reserved before this method returns, so later callers coalesce onto it. On success the
  ///    value is stored for `ttl`. On failure the entry is removed and every waiter receives
  ///    the same error.
  ///
  /// The tentative expiry of a reservation is also `now + ttl`. A computation that outlives
  /// it no longer blocks new computations for the key.
  ///
  /// # Panics
  ///
  /// Must be called from within a Tokio runtime. Awaiting the returned future panics if the
  /// computation itself panicked.
  pub fn get_or_fetch_with_ttl<F, Fut>(
    &self,
    key: &str,
    ttl: Duration,
    factory: F,
  ) -> BoxFuture<'static, Result<V, E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let reservation = {
      let mut entries = self.inner.entries();
      let now = Instant::now();
      if let Some(found) = self.lookup_fresh(&mut entries, key, now) {
        return found;
      }
      self.reserve(&mut entries, key, ttl, now)
    };

    // The factory runs outside the lock; the reservation already excludes other callers.
    reservation.launch(factory())
  }

  /// Recompute `key` even if a fresh value is stored, using the default TTL.
  #[allow(dead_code)]
  pub fn refresh<F, Fut>(&self, key: &str, factory: F) -> BoxFuture<'static, Result<V, E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    self.refresh_with_ttl(key, self.inner.default_ttl, factory)
  }

  /// Recompute `key` even if a fresh value is stored.
  ///
  /// If a computation is already in flight, the caller joins it instead. The stored value
  /// stays in place until the new one lands. Readers see the refresh in progress
  /// rather than the old value.
  pub fn refresh_with_ttl<F, Fut>(
    &self,
    key: &str,
    ttl: Duration,
    factory: F,
  ) -> BoxFuture<'static, Result<V, E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let reservation = {
      let mut entries = self.inner.entries();
      let now = Instant::now();

      let state = entries.get(key).map(|entry| {
        let flight = entry.pending.as_ref().map(|p| p.flight.clone());
        (entry.is_fresh(now), flight)
      });
      match state {
        Some((true, Some(flight))) => {
          self.inner.counters.coalesced();
          trace!(key, "refresh attached to in-flight request");
          return flight.boxed();
        }
        Some((false, _)) => {
          entries.remove(key);
        }
        _ => {}
      }

      self.reserve(&mut entries, key, ttl, now)
    };

    reservation.launch(factory())
  }

  /// Remove a single key. Returns whether anything was removed.
  #[allow(dead_code)]
  pub fn invalidate(&self, key: &str) -> bool {
    let removed = self.inner.entries().remove(key).is_some();
    if removed {
      debug!(key, "invalidated cache entry");
    }
    removed
  }

  /// Remove every key starting with `prefix`. Returns how many entries were removed.
  pub fn invalidate_prefix(&self, prefix: &str) -> usize {
    let mut entries = self.inner.entries();
    let before = entries.len();
    entries.retain(|key, _| !key.starts_with(prefix));
    let removed = before - entries.len();

    if removed > 0 {
      debug!(prefix, removed, "invalidated cache entries by prefix");
    }
    removed
  }

  /// Remove everything.
  #[allow(dead_code)]
  pub fn clear(&self) {
    let mut entries = self.inner.entries();
    let removed = entries.len();
    entries.clear();
    debug!(removed, "cache cleared");
  }

  /// Physically remove entries whose expiry has passed. Returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.inner.entries();
    let before = entries.len();
    entries.retain(|_, entry| entry.is_fresh(now));
    before - entries.len()
  }

  pub fn stats(&self) -> CacheStats {
    let now = Instant::now();
    let entries = self.inner.entries();
    let pending = entries.values().filter(|e| e.pending.is_some()).count();
    let expired = entries.values().filter(|e| !e.is_fresh(now)).count();

    self.inner.counters.snapshot(entries.len(), pending, expired)
  }

  /// Answer from a fresh entry, evicting the key if it has expired.
  fn lookup_fresh(
    &self,
    entries: &mut Entries<V, E>,
    key: &str,
    now: Instant,
  ) -> Option<BoxFuture<'static, Result<V, E>>> {
    let fresh = entries.get(key)?.is_fresh(now);
    if !fresh {
      entries.remove(key);
      trace!(key, "evicted expired cache entry");
      return None;
    }

    let (source, found) = entries.get(key)?.lookup()?;
    match source {
      EntrySource::Value => {
        self.inner.counters.hit();
        trace!(key, "cache hit");
      }
      EntrySource::Pending => {
        self.inner.counters.coalesced();
        trace!(key, "attached to in-flight request");
      }
    }
    Some(found)
  }

  /// Register a new flight for `key` while the map is locked.
  fn reserve(
    &self,
    entries: &mut Entries<V, E>,
    key: &str,
    ttl: Duration,
    now: Instant,
  ) -> Reservation<V, E> {
    let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
    let (sender, receiver) = oneshot::channel::<Result<V, E>>();

    let flight_key = key.to_string();
    let flight: Flight<V, E> = async move {
      match receiver.await {
        Ok(result) => result,
        Err(_) => panic!("cache computation for `{flight_key}` ended without a result"),
      }
    }
    .boxed()
    .shared();

    let expiry = expiry_after(now, ttl);
    match entries.get_mut(key) {
      // Forced refresh: the stored value stays readable until the flight lands
      Some(entry) => {
        entry.expiry = expiry;
        entry.pending = Some(PendingFlight {
          id,
          flight: flight.clone(),
        });
      }
      None => {
        entries.insert(
          key.to_string(),
          CacheEntry::pending(id, flight.clone(), expiry),
        );
      }
    }

    self.inner.counters.miss();
    trace!(key, flight = id, "cache miss, starting request");

    Reservation {
      guard: FlightGuard {
        inner: Arc::clone(&self.inner),
        key: key.to_string(),
        id,
        ttl,
        armed: true,
      },
      sender,
      flight,
    }
  }
}

impl<V, E> Default for TtlCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<V, E> Clone for TtlCache<V, E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<V, E> fmt::Debug for TtlCache<V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TtlCache")
      .field("default_ttl", &self.inner.default_ttl)
      .field("entries", &self.inner.entries().len())
      .finish_non_exhaustive()
  }
}

/// A reserved key waiting for its computation to be started.
struct Reservation<V, E> {
  guard: FlightGuard<V, E>,
  sender: oneshot::Sender<Result<V, E>>,
  flight: Flight<V, E>,
}

impl<V, E> Reservation<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// Drive `computation` to completion in the background and hand out the shared result.
  fn launch<Fut>(self, computation: Fut) -> BoxFuture<'static, Result<V, E>>
  where
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let Reservation {
      guard,
      sender,
      flight,
    } = self;

    tokio::spawn(async move {
      let result = computation.await;
      // The map is updated before anyone is woken
      guard.settle(&result);
      // Every waiter may have gone away already
      let _ = sender.send(result);
    });

    flight.boxed()
  }
}

/// Clears a flight's pending marker once it settles, or removes the entry if the flight is
/// dropped without settling (panic, runtime shutdown).
struct FlightGuard<V, E> {
  inner: Arc<Inner<V, E>>,
  key: String,
  id: u64,
  ttl: Duration,
  armed: bool,
}

impl<V: Clone, E> FlightGuard<V, E> {
  fn settle(mut self, result: &Result<V, E>) {
    self.armed = false;

    if result.is_err() {
      self.inner.counters.failure();
    }

    let mut entries = self.inner.entries();
    let current = entries
      .get(&self.key)
      .is_some_and(|entry| entry.is_flight(self.id));
    if !current {
      debug!(
        key = %self.key,
        flight = self.id,
        "entry replaced while request was in flight, result not stored"
      );
      return;
    }

    match result {
      Ok(value) => {
        if let Some(entry) = entries.get_mut(&self.key) {
          entry.value = Some(value.clone());
          entry.expiry = expiry_after(Instant::now(), self.ttl);
          entry.pending = None;
        }
        debug!(key = %self.key, flight = self.id, "stored response");
      }
      Err(_) => {
        entries.remove(&self.key);
        warn!(key = %self.key, flight = self.id, "request failed, entry removed");
      }
    }
  }
}

impl<V, E> Drop for FlightGuard<V, E> {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }

    let mut entries = self.inner.entries();
    if entries
      .get(&self.key)
      .is_some_and(|entry| entry.is_flight(self.id))
    {
      entries.remove(&self.key);
      warn!(key = %self.key, flight = self.id, "request abandoned before settling, entry removed");
    }
  }
}
