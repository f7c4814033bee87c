//! Cache Entry Module
//!
//! Defines the wrapper stored for every key, tracking when it was last used.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and access metadata.
///
/// Timestamps come from `tokio::time::Instant`, so tests running on a paused
/// tokio clock observe idle time deterministically.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was installed
    pub created_at: Instant,
    /// Refreshed on every successful lookup
    pub last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry, stamped as accessed now.
    pub fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
        }
    }

    // == Touch ==
    /// Marks the entry as used now.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    // == Idle Time ==
    /// Returns how long the entry has gone unused as of `now`.
    ///
    /// Zero if the entry was touched after `now`.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }

    // == Is Stale ==
    /// Checks if the entry is eligible for eviction as of `now`.
    ///
    /// Boundary condition: an entry is stale once its idle time is greater
    /// than or equal to `ttl`. An entry touched after `now` is never stale,
    /// which keeps a zero TTL from evicting entries used mid-sweep.
    pub fn is_stale(&self, ttl: Duration, now: Instant) -> bool {
        match now.checked_duration_since(self.last_accessed) {
            Some(idle) => idle >= ttl,
            None => false,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_creation() {
        let entry = CacheEntry::new("test_value");

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.created_at, entry.last_accessed);
        assert_eq!(entry.idle(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_goes_stale() {
        let entry = CacheEntry::new(1);
        let ttl = Duration::from_secs(1);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!entry.is_stale(ttl, Instant::now()));

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(entry.is_stale(ttl, Instant::now()));
        assert_eq!(entry.idle(Instant::now()), Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_idle_time() {
        let mut entry = CacheEntry::new(1);
        let created = entry.created_at;

        tokio::time::advance(Duration::from_secs(3)).await;
        entry.touch();

        assert_eq!(entry.created_at, created);
        assert_eq!(entry.idle(Instant::now()), Duration::ZERO);
        assert!(!entry.is_stale(Duration::from_secs(1), Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_boundary_condition() {
        let entry = CacheEntry::new(1);
        let ttl = Duration::from_secs(2);

        tokio::time::advance(ttl).await;

        // Idle time exactly equal to the TTL counts as stale
        assert!(entry.is_stale(ttl, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_spares_entries_touched_after_sweep_start() {
        let sweep_started = Instant::now();
        tokio::time::advance(Duration::from_millis(10)).await;
        let entry = CacheEntry::new(1);

        assert!(!entry.is_stale(Duration::ZERO, sweep_started));
        assert!(entry.is_stale(Duration::ZERO, Instant::now()));
    }
}
