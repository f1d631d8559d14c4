//! Process-wide content cache with an injectable clock.
//!
//! Each entry stores the decoded payload with the time it was cached. An
//! entry is fresh while `now - cached_at` is below the freshness window and
//! stale afterwards; stale entries are kept so a failed refresh can still
//! hand back the previous value.
//!
//! ## Single-flight
//!
//! Concurrent misses for the same key are coalesced: callers take the
//! per-key flight guard from [`CacheService::acquire`], then re-read the
//! cache before querying. Only the first caller pays for the fetch.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

/// Source of the current time for freshness decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = chrono::TimeDelta::from_std(by).unwrap_or(chrono::TimeDelta::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A cached payload with the time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub cached_at: DateTime<Utc>,
}

/// Result of looking a key up against the freshness window.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// Present and younger than the window.
    Fresh(CacheEntry<T>),
    /// Present but at or past the window.
    Stale(CacheEntry<T>),
    Miss,
}

impl<T> CacheLookup<T> {
    /// The entry, fresh or stale.
    pub fn into_entry(self) -> Option<CacheEntry<T>> {
        match self {
            Self::Fresh(entry) | Self::Stale(entry) => Some(entry),
            Self::Miss => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Whether a loader activation was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

struct StoredEntry {
    value: Arc<dyn Any + Send + Sync>,
    cached_at: DateTime<Utc>,
}

/// Shared, typed, time-windowed cache keyed by loader name.
pub struct CacheService {
    entries: Mutex<HashMap<String, StoredEntry>>,
    flights: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("entries", &self.entries.lock().len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CacheService {
    /// Create a cache using wall-clock time.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The freshness window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read an entry regardless of its age.
    ///
    /// An entry stored under `key` with a different type reads as absent.
    pub fn get<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.lock();
        let stored = entries.get(key)?;
        match stored.value.downcast_ref::<T>() {
            Some(value) => Some(CacheEntry {
                value: value.clone(),
                cached_at: stored.cached_at,
            }),
            None => {
                tracing::warn!(key = %key, "cached entry has unexpected type");
                None
            }
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<T>(&self, key: &str, value: T, cached_at: DateTime<Utc>)
    where
        T: Send + Sync + 'static,
    {
        self.entries.lock().insert(
            key.to_string(),
            StoredEntry {
                value: Arc::new(value),
                cached_at,
            },
        );
    }

    /// Whether an entry exists for `key` and is younger than the window.
    pub fn is_fresh(&self, key: &str) -> bool {
        let cached_at = self.entries.lock().get(key).map(|e| e.cached_at);
        cached_at.is_some_and(|at| self.within_window(at))
    }

    /// Look `key` up and classify it against the window.
    pub fn lookup<T>(&self, key: &str) -> CacheLookup<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.get::<T>(key) {
            Some(entry) if self.within_window(entry.cached_at) => CacheLookup::Fresh(entry),
            Some(entry) => CacheLookup::Stale(entry),
            None => CacheLookup::Miss,
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Take the single-flight guard for `key`.
    ///
    /// Holders should re-read the cache after acquiring: a previous holder
    /// may have filled it while this caller waited.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let flight = self
            .flights
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        flight.lock_owned().await
    }

    /// Get a fresh value or fetch, cache and return a new one.
    ///
    /// Concurrent callers for the same key share one fetch. Errors are not
    /// cached and leave any previous entry in place.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<(T, CacheStatus), E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let CacheLookup::Fresh(entry) = self.lookup::<T>(key) {
            tracing::debug!(key = %key, cached_at = %entry.cached_at, "cache hit");
            return Ok((entry.value, CacheStatus::Hit));
        }

        let _flight = self.acquire(key).await;
        if let CacheLookup::Fresh(entry) = self.lookup::<T>(key) {
            tracing::debug!(key = %key, "cache filled while waiting");
            return Ok((entry.value, CacheStatus::Hit));
        }

        tracing::debug!(key = %key, "cache miss, fetching");
        let value = fetch().await?;
        self.set(key, value.clone(), self.now());
        Ok((value, CacheStatus::Miss))
    }

    fn within_window(&self, cached_at: DateTime<Utc>) -> bool {
        match (self.now() - cached_at).to_std() {
            Ok(age) => age < self.ttl,
            // Stored in the future relative to the clock
            Err(_) => true,
        }
    }
}
