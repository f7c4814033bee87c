//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, evictions, creations and sweeps.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of lookups that found a live entry
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Number of entries removed by sweeps for exceeding the TTL
    pub evictions: u64,
    /// Number of values produced by get-or-create creators
    pub creations: u64,
    /// Number of completed sweep passes
    pub sweeps: u64,
    /// Sweep steps that reached the store after it was closed (should stay zero)
    pub late_sweep_accesses: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_creation(&mut self) {
        self.creations += 1;
    }

    pub fn record_sweep(&mut self) {
        self.sweeps += 1;
    }

    pub fn record_late_sweep_access(&mut self) {
        self.late_sweep_accesses += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_sweep_counters() {
        let mut stats = CacheStats::new();
        stats.record_sweep();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_creation();

        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.creations, 1);
        assert_eq!(stats.late_sweep_accesses, 0);
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.set_total_entries(42);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["total_entries"], 42);
        assert_eq!(json["late_sweep_accesses"], 0);
    }
}
