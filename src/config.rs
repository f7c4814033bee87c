//! Configuration Module
//!
//! Handles cache construction parameters, loaded from code or environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum idle time before an entry becomes eligible for eviction
    pub ttl: Duration,
    /// Delay between background sweeps
    pub sweep_interval: Duration,
    /// Whether to start the background sweeper at construction
    pub sweeper_enabled: bool,
    /// Upper bound on how long teardown waits for the sweeper to exit
    pub shutdown_grace: Duration,
}

impl CacheConfig {
    /// Creates a config with the given TTL and sweep interval, other fields defaulted.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            ttl,
            sweep_interval,
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_SECS` - Idle TTL in seconds (default: 300)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 1)
    /// - `CACHE_SHUTDOWN_GRACE_MS` - Teardown wait in milliseconds (default: 2000)
    /// - `CACHE_NO_SWEEPER` - If set (to anything), the sweeper is not started
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            sweeper_enabled: env::var_os("CACHE_NO_SWEEPER").is_none(),
            shutdown_grace: env::var("CACHE_SHUTDOWN_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    /// Suppresses the background sweeper; entries then only leave the cache
    /// through `remove`, `clear` or an explicit `purge_expired`.
    pub fn without_sweeper(mut self) -> Self {
        self.sweeper_enabled = false;
        self
    }

    // == Validate ==
    /// Rejects configurations the sweeper cannot run with.
    ///
    /// A zero sweep interval would make the sweeper spin, so it is refused even
    /// when the sweeper is disabled.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(1),
            sweeper_enabled: true,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}
