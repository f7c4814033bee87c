//! Cache Store Module
//!
//! Main cache engine: a locked HashMap of entries with idle-time expiry and
//! single-flight get-or-create.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{self, Debug, Write as _};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::flight::Flight;
use crate::cache::{CacheEntry, CacheStats};
use crate::error::{CacheError, Result};

// == Store Inner ==
/// Everything guarded by the store lock.
struct StoreInner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Keys whose get-or-create creator is currently running
    in_flight: HashMap<K, Arc<Flight<V>>>,
    stats: CacheStats,
    closed: bool,
}

impl<K: Eq + Hash, V> StoreInner<K, V> {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(CacheError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Inserts a fresh entry, returning the one it replaced.
    fn install(
        &mut self,
        key: K,
        value: V,
        length: &AtomicUsize,
    ) -> Result<Option<CacheEntry<V>>> {
        self.entries
            .try_reserve(1)
            .map_err(|_| CacheError::OutOfMemory)?;

        let previous = self.entries.insert(key, CacheEntry::new(value));
        if previous.is_none() {
            length.fetch_add(1, Ordering::AcqRel);
        }
        self.stats.set_total_entries(self.entries.len());
        Ok(previous)
    }

    /// Drops the in-flight marker for `key` if it is still `flight`.
    fn clear_flight(&mut self, key: &K, flight: &Arc<Flight<V>>) {
        if self
            .in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            self.in_flight.remove(key);
        }
    }
}

// == Cache Store ==
/// Thread-safe cache storage with idle-time expiry.
///
/// Every read, write and sweep step takes the store lock for a single entry
/// operation; sweeps never hold it across the whole table. Replaced and
/// removed values are dropped after the lock is released.
pub struct CacheStore<K, V> {
    inner: Mutex<StoreInner<K, V>>,
    /// Live entry count, readable without the lock
    length: AtomicUsize,
    /// Idle time after which an entry may be swept
    ttl: Duration,
}

impl<K, V> Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("length", &self.length.load(Ordering::Acquire))
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<K: Eq + Hash, V> CacheStore<K, V> {
    // == Constructor ==
    /// Creates an empty store whose entries expire after `ttl` of idleness.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                stats: CacheStats::new(),
                closed: false,
            }),
            length: AtomicUsize::new(0),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Put ==
    /// Stores a value, replacing (and dropping) any previous value for `key`.
    ///
    /// Either the new entry is fully installed or the store is left untouched.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let previous = {
            let mut inner = self.inner.lock();
            inner.ensure_open()?;
            inner.install(key, value, &self.length)?
        };
        drop(previous);
        Ok(())
    }

    // == Remove ==
    /// Removes an entry, handing its value back to the caller.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;

        let removed = inner.entries.remove(key);
        if removed.is_some() {
            self.length.fetch_sub(1, Ordering::AcqRel);
            let remaining = inner.entries.len();
            inner.stats.set_total_entries(remaining);
        }
        Ok(removed.map(|entry| entry.value))
    }

    // == Clear ==
    /// Drops every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let drained = {
            let mut inner = self.inner.lock();
            inner.ensure_open()?;
            self.length.store(0, Ordering::Release);
            inner.stats.set_total_entries(0);
            std::mem::take(&mut inner.entries)
        };
        Ok(drained.len())
    }

    // == Length ==
    /// Returns the number of entries, including stale ones not yet swept.
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Stats ==
    /// Returns a snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    // == Close ==
    /// Releases every entry and rejects all further operations.
    ///
    /// Returns the number of entries released, or `None` if the store was
    /// already closed. Callers waiting on an in-flight creation are woken and
    /// observe `CacheError::Destroyed`.
    pub fn close(&self) -> Option<usize> {
        let (entries, flights) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return None;
            }
            inner.closed = true;
            self.length.store(0, Ordering::Release);
            inner.stats.set_total_entries(0);
            (
                std::mem::take(&mut inner.entries),
                std::mem::take(&mut inner.in_flight),
            )
        };

        for flight in flights.into_values() {
            flight.abandon();
        }
        Some(entries.len())
    }
}

impl<K: Eq + Hash, V: Clone> CacheStore<K, V> {
    // == Get ==
    /// Retrieves a value by key, refreshing its last-access time.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.ensure_open()?;

        let found = inner.entries.get_mut(key).map(|entry| {
            entry.touch();
            entry.value.clone()
        });
        match found {
            Some(_) => inner.stats.record_hit(),
            None => inner.stats.record_miss(),
        }
        Ok(found)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> CacheStore<K, V> {
    // == Get Or Create ==
    /// Returns the cached value for `key`, creating and caching it on a miss.
    ///
    /// Concurrent misses on the same key share one `creator` call: the first
    /// caller runs it while the others block until its value is installed.
    /// Calling this for `key` from inside its own creator deadlocks.
    pub fn get_or_create<F>(&self, key: K, creator: F) -> Result<V>
    where
        F: FnOnce(&K) -> V,
    {
        self.try_get_or_create(key, |key| Ok::<V, CacheError>(creator(key)))
    }

    // == Try Get Or Create ==
    /// Fallible variant of [`CacheStore::get_or_create`].
    ///
    /// A creator error is returned unchanged and nothing is inserted. Callers
    /// waiting on the failed creation retry, and one of them runs its own
    /// creator.
    pub fn try_get_or_create<F, E>(&self, key: K, creator: F) -> std::result::Result<V, E>
    where
        F: FnOnce(&K) -> std::result::Result<V, E>,
        E: From<CacheError>,
    {
        // A call counts as one hit or one miss, however often it retries
        let mut counted = false;
        let flight = loop {
            let pending = {
                let mut guard = self.inner.lock();
                let inner = &mut *guard;
                inner.ensure_open()?;

                if let Some(entry) = inner.entries.get_mut(&key) {
                    entry.touch();
                    let value = entry.value.clone();
                    if !counted {
                        inner.stats.record_hit();
                    }
                    return Ok(value);
                }
                if !counted {
                    inner.stats.record_miss();
                    counted = true;
                }

                match inner.in_flight.get(&key) {
                    Some(flight) => Arc::clone(flight),
                    None => {
                        let flight = Arc::new(Flight::new());
                        inner.in_flight.insert(key.clone(), Arc::clone(&flight));
                        break flight;
                    }
                }
            };

            if let Some(value) = pending.wait() {
                return Ok(value);
            }
            debug!("in-flight creation abandoned, retrying");
        };

        let leader = Leader {
            store: self,
            key,
            flight,
            settled: false,
        };
        let value = creator(&leader.key)?;
        Ok(leader.finish(value)?)
    }
}

impl<K: Eq + Hash + Clone, V> CacheStore<K, V> {
    // == Purge Expired ==
    /// Runs one sweep pass immediately. Returns the number of entries evicted.
    pub fn purge_expired(&self) -> Result<usize> {
        self.inner.lock().ensure_open()?;
        Ok(self.sweep(|| false))
    }

    // == Sweep ==
    /// Evicts every entry idle for at least the TTL.
    ///
    /// `now` is fixed at the start of the pass. `should_stop` is checked before
    /// each entry visit and again before the pass is recorded; once it returns
    /// true the store is not touched again. A stopped pass is not counted.
    pub(crate) fn sweep<F>(&self, should_stop: F) -> usize
    where
        F: Fn() -> bool,
    {
        let now = Instant::now();
        let keys: Vec<K> = {
            let mut inner = self.inner.lock();
            if inner.closed {
                inner.stats.record_late_sweep_access();
                warn!("Sweep reached a closed cache store");
                return 0;
            }
            inner.entries.keys().cloned().collect()
        };

        let mut evicted = 0;
        for key in keys {
            if should_stop() {
                debug!(evicted, "Sweep interrupted by stop request");
                return evicted;
            }
            match self.evict_if_stale(&key, now) {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(_) => return evicted,
            }
        }
        if should_stop() {
            return evicted;
        }

        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.stats.record_sweep();
        }
        evicted
    }

    /// Removes `key` if it is stale as of `now`.
    fn evict_if_stale(&self, key: &K, now: Instant) -> Result<bool> {
        let removed = {
            let mut inner = self.inner.lock();
            if inner.closed {
                inner.stats.record_late_sweep_access();
                warn!("Sweep reached a closed cache store");
                return Err(CacheError::Destroyed);
            }

            let stale = inner
                .entries
                .get(key)
                .is_some_and(|entry| entry.is_stale(self.ttl, now));
            if !stale {
                return Ok(false);
            }

            let removed = inner.entries.remove(key);
            self.length.fetch_sub(1, Ordering::AcqRel);
            let remaining = inner.entries.len();
            inner.stats.record_eviction();
            inner.stats.set_total_entries(remaining);
            removed
        };
        drop(removed);
        Ok(true)
    }
}

impl<K: Eq + Hash + Debug, V: Debug> CacheStore<K, V> {
    // == Dump ==
    /// Renders every entry as a `key => value` line, in no particular order.
    pub fn dump(&self) -> Result<String> {
        let inner = self.inner.lock();
        inner.ensure_open()?;

        let now = Instant::now();
        let mut out = String::new();
        for (key, entry) in &inner.entries {
            writeln!(
                out,
                "{:?} => {:?} (idle {:?})",
                key,
                entry.value,
                entry.idle(now)
            )
            .expect("writing to a String cannot fail");
        }
        debug!(entries = inner.entries.len(), "Cache dump");
        Ok(out)
    }
}

// == Leader ==
/// The caller running a get-or-create creator.
///
/// Dropping it without `finish` (creator error, panic, closed store) clears
/// the in-flight marker and wakes followers so one of them can take over.
struct Leader<'a, K: Eq + Hash + Clone, V: Clone> {
    store: &'a CacheStore<K, V>,
    key: K,
    flight: Arc<Flight<V>>,
    settled: bool,
}

impl<K: Eq + Hash + Clone, V: Clone> Leader<'_, K, V> {
    /// Installs the created value and hands it to every follower.
    fn finish(mut self, value: V) -> Result<V> {
        let previous = {
            let mut inner = self.store.inner.lock();
            inner.ensure_open()?;
            let previous = inner.install(self.key.clone(), value.clone(), &self.store.length)?;
            inner.stats.record_creation();
            inner.clear_flight(&self.key, &self.flight);
            previous
        };

        self.flight.complete(value.clone());
        self.settled = true;
        drop(previous);
        Ok(value)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.store.inner.lock().clear_flight(&self.key, &self.flight);
        self.flight.abandon();
    }
}
