//! TTL Cache - A process-local key/value cache with idle expiry
//!
//! Entries expire after going unused for a configured TTL and are evicted by a
//! background sweeper. Values can be produced lazily with get-or-create.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::SweeperState;
