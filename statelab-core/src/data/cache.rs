//! Time-to-live cache with an injectable clock.
//!
//! Replaces a process-wide memo: each cache is an owned value, shared by
//! `Arc` where needed, and tests drive expiry with [`ManualClock`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use parking_lot::Mutex;

use super::provider::{DataError, MacroContextProvider};
use crate::context::MacroContext;

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value if it has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|(stored, _)| now.duration_since(*stored) < self.ttl)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.entries.lock().insert(key, (now, value));
    }

    /// Cached value, or compute, store, and return it. Errors are not cached.
    pub fn get_or_try_insert<E>(&self, key: K, fetch: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = fetch()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop expired entries.
    pub fn purge(&self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries
            .lock()
            .retain(|_, (stored, _)| now.duration_since(*stored) < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default lifetime of a cached macro backdrop.
pub const MACRO_TTL: Duration = Duration::from_secs(3600);

/// [`MacroContextProvider`] that memoizes an inner provider per as-of date.
pub struct CachedMacroProvider<P> {
    inner: P,
    cache: TtlCache<NaiveDate, MacroContext>,
}

impl<P: MacroContextProvider> CachedMacroProvider<P> {
    pub fn new(inner: P, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, clock),
        }
    }

    pub fn with_system_clock(inner: P) -> Self {
        Self::new(inner, MACRO_TTL, Arc::new(SystemClock))
    }
}

impl<P: MacroContextProvider> MacroContextProvider for CachedMacroProvider<P> {
    fn macro_context(&self, as_of: NaiveDate) -> Result<MacroContext, DataError> {
        self.cache
            .get_or_try_insert(as_of, || self.inner.macro_context(as_of))
    }
}
