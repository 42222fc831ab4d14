//! In-memory TTL cache with an injectable clock.
//!
//! Used for the consolidated token catalog, which is refreshed on a coarse
//! interval rather than per fetch cycle. Nothing is persisted.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::debug;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Key/value cache whose entries expire `ttl` after they were stored.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
    V: Clone,
{
    /// Create a cache backed by the system clock.
    pub fn new(ttl: std::time::Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(36_500)),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a fresh value for `key`. Expired entries are evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => now.signed_duration_since(entry.stored_at) >= self.ttl,
        };

        if expired {
            debug!("Cache entry {:?} expired", key);
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn set(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.lock().insert(key, Entry { value, stored_at });
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including ones that expired but were not read since.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
