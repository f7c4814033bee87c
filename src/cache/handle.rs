//! Cache Handle Module
//!
//! The owned cache value: one store plus the sweeper bound to it, created and
//! torn down together.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{Sweeper, SweeperState};

// == Cache ==
/// A key/value cache whose entries expire after a period of idleness.
///
/// Construct it inside a tokio runtime to get a background sweeper; share it
/// between callers by wrapping it in an `Arc`. Call [`Cache::destroy`] to stop
/// the sweeper and release all entries; dropping the cache only signals the
/// sweeper to stop.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_cache::Cache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ttl_cache::Result<()> {
/// let cache: Cache<String, u32> = Cache::with_ttl(Duration::from_secs(60), Duration::from_secs(1))?;
/// cache.put("a".to_string(), 1)?;
/// assert_eq!(cache.get("a")?, Some(1));
/// assert_eq!(cache.get_or_create("b".to_string(), |key| key.len() as u32)?, 1);
/// cache.destroy().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Cache<K, V> {
    store: Arc<CacheStore<K, V>>,
    sweeper: Sweeper,
    config: CacheConfig,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache and, unless disabled in `config`, starts its sweeper.
    ///
    /// Fails with `InvalidConfig` for a zero sweep interval. If no tokio
    /// runtime is available the cache is still returned, but
    /// [`Cache::sweeper_state`] reports `Unavailable` and entries only leave
    /// through explicit removal.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(CacheStore::new(config.ttl));
        let sweeper = if config.sweeper_enabled {
            Sweeper::spawn(Arc::clone(&store), config.sweep_interval)
        } else {
            debug!("Sweeper disabled by configuration");
            Sweeper::disabled()
        };

        info!(
            "Cache created: ttl={:?}, sweep_interval={:?}, sweeper={:?}",
            config.ttl,
            config.sweep_interval,
            sweeper.state()
        );

        Ok(Self {
            store,
            sweeper,
            config,
        })
    }

    /// Creates a cache with the given TTL and sweep interval.
    pub fn with_ttl(ttl: Duration, sweep_interval: Duration) -> Result<Self> {
        Self::new(CacheConfig::new(ttl, sweep_interval))
    }

    // == Put ==
    /// Stores `value` under `key`, dropping any value it replaces.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.store.put(key, value)
    }

    // == Get ==
    /// Returns the value for `key`, counting the lookup as a use for TTL purposes.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get(key)
    }

    // == Get Or Create ==
    /// Returns the value for `key`, producing and caching it with `creator` on a miss.
    ///
    /// See [`CacheStore::get_or_create`] for the concurrency contract.
    pub fn get_or_create<F>(&self, key: K, creator: F) -> Result<V>
    where
        F: FnOnce(&K) -> V,
    {
        self.store.get_or_create(key, creator)
    }

    /// Like [`Cache::get_or_create`], for creators that can fail.
    pub fn try_get_or_create<F, E>(&self, key: K, creator: F) -> std::result::Result<V, E>
    where
        F: FnOnce(&K) -> std::result::Result<V, E>,
        E: From<CacheError>,
    {
        self.store.try_get_or_create(key, creator)
    }

    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.remove(key)
    }

    /// Drops every entry, returning how many there were.
    pub fn clear(&self) -> Result<usize> {
        self.store.clear()
    }

    /// Runs a sweep pass now, returning how many entries were evicted.
    pub fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired()
    }

    // == Length ==
    /// Returns the entry count. Stale entries count until a sweep removes them.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn sweeper_state(&self) -> SweeperState {
        self.sweeper.state()
    }

    pub fn is_destroyed(&self) -> bool {
        self.store.is_closed()
    }

    // == Destroy ==
    /// Stops the sweeper, then releases every entry.
    ///
    /// Waits at most `shutdown_grace` for the sweeper before releasing the
    /// store regardless. Every later operation fails with
    /// `CacheError::Destroyed`; calling this again does nothing.
    pub async fn destroy(&self) {
        let state = self.sweeper.stop(self.config.shutdown_grace).await;

        match self.store.close() {
            Some(released) => info!(
                "Cache destroyed: released {} entries, sweeper {:?}",
                released, state
            ),
            None => debug!("Cache already destroyed"),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Debug,
    V: Debug,
{
    /// Renders every entry as a `key => value` line, for diagnostics.
    pub fn dump(&self) -> Result<String> {
        self.store.dump()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig::new(Duration::from_secs(1), Duration::from_secs(1))
            .with_shutdown_grace(Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_starts_sweeper() {
        let cache: Cache<String, u32> = Cache::new(test_config()).unwrap();
        assert_eq!(cache.sweeper_state(), SweeperState::Running);

        cache.destroy().await;
        assert_eq!(cache.sweeper_state(), SweeperState::Stopped);
        assert!(cache.is_destroyed());
    }

    #[tokio::test]
    async fn test_new_rejects_zero_sweep_interval() {
        let config = test_config().with_sweep_interval(Duration::ZERO);
        let result: Result<Cache<String, u32>> = Cache::new(config);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_sweeper_can_be_disabled() {
        let cache: Cache<String, u32> = Cache::new(test_config().without_sweeper()).unwrap();
        assert_eq!(cache.sweeper_state(), SweeperState::Disabled);

        cache.destroy().await;
        assert_eq!(cache.sweeper_state(), SweeperState::Disabled);
    }

    #[test]
    fn test_new_without_runtime_is_degraded() {
        let cache: Cache<&str, u32> = Cache::new(test_config()).unwrap();
        assert_eq!(cache.sweeper_state(), SweeperState::Unavailable);

        // Foreground operations still work
        cache.put("a", 1).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some(1));

        tokio_test::block_on(cache.destroy());
        assert!(cache.is_destroyed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_is_idempotent() {
        let cache: Cache<&str, u32> = Cache::new(test_config()).unwrap();
        cache.put("a", 1).unwrap();

        cache.destroy().await;
        cache.destroy().await;

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.put("b", 2), Err(CacheError::Destroyed));
        assert_eq!(cache.get("a"), Err(CacheError::Destroyed));
        assert_eq!(cache.dump(), Err(CacheError::Destroyed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_cache_stops_sweeper() {
        let cache: Cache<&str, u32> = Cache::new(test_config()).unwrap();
        let store = Arc::clone(&cache.store);
        drop(cache);

        tokio::time::sleep(Duration::from_secs(5)).await;

        // The sweeper task has exited and released its handle on the store
        assert_eq!(Arc::strong_count(&store), 1);
        assert_eq!(store.stats().sweeps, 0);
    }
}
