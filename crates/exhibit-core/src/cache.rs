//! Time-to-live cache and the clock it reads.
//!
//! [`TtlCache`] is a plain in-memory map whose entries carry the second at
//! which they were fetched. An entry is fresh while
//! `now - fetched_at <= ttl_seconds`. Entries are never evicted; a stale entry
//! simply stops being returned until the next successful fetch overwrites it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::logging::targets;

/// TTL used when the configured value is zero or negative (one hour).
pub const DEFAULT_TTL_SECONDS: i64 = 60 * 60;

/// A source of wall-clock time in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch.
    fn now_unix_seconds(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `now`.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix_seconds(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: i64,
}

/// A key-value cache with per-entry freshness.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl_seconds: i64,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Create an empty cache.
    ///
    /// A `ttl_seconds` of zero or less selects [`DEFAULT_TTL_SECONDS`].
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl_seconds: normalize_ttl(ttl_seconds),
            entries: HashMap::new(),
        }
    }

    /// The effective TTL of this cache.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Look up a fresh value for `key` as of `now`.
    ///
    /// Missing and stale entries both yield `None`.
    pub fn try_get<Q>(&self, key: &Q, now: i64) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.get(key)?;
        let age = now - entry.fetched_at;
        if age <= self.ttl_seconds {
            Some(entry.value.clone())
        } else {
            tracing::trace!(target: targets::CACHE, age, ttl = self.ttl_seconds, "stale entry");
            None
        }
    }

    /// Store `value` for `key`, replacing any previous entry.
    pub fn put(&mut self, key: K, value: V, fetched_at: i64) {
        self.entries.insert(key, CacheEntry { value, fetched_at });
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apply the default to a configured TTL.
pub fn normalize_ttl(ttl_seconds: i64) -> i64 {
    if ttl_seconds > 0 {
        ttl_seconds
    } else {
        DEFAULT_TTL_SECONDS
    }
}
