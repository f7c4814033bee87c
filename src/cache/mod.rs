//! Cache Module
//!
//! Provides the in-memory cache engine with idle-time (TTL) expiry and
//! get-or-create memoization.

mod entry;
mod flight;
mod handle;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use handle::Cache;
pub use stats::CacheStats;
pub use store::CacheStore;
