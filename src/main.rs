//! TTL Cache demo
//!
//! Fills a cache, then watches the background sweeper drain it.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::{Cache, CacheConfig, SweeperState};

const KEYS: [&str; 4] = ["key1", "key2", "key3", "key4"];

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache (and its sweeper)
/// 4. Store and read back a few values, then memoize one with get-or-create
/// 5. Dump the cache until the sweeper empties it or Ctrl+C is pressed
/// 6. Print statistics and destroy the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: ttl={:?}, sweep_interval={:?}, sweeper_enabled={}",
        config.ttl, config.sweep_interval, config.sweeper_enabled
    );
    let sweep_interval = config.sweep_interval;

    let cache: Cache<String, usize> = Cache::new(config).context("failed to create cache")?;

    for (value, key) in KEYS.iter().enumerate() {
        cache.put(key.to_string(), value + 1)?;
        let stored = cache.get(*key)?;
        info!("{} => {:?}", key, stored);
    }

    let hit = cache.get_or_create(KEYS[0].to_string(), |key| {
        warn!("Creator unexpectedly ran for cached key {}", key);
        0
    })?;
    info!("get_or_create({}) => {}", KEYS[0], hit);

    let created = cache.get_or_create("testVal".to_string(), |key| key.len())?;
    info!("get_or_create(testVal) => {}", created);

    if cache.sweeper_state() == SweeperState::Running {
        tokio::select! {
            drained = drain(&cache, sweep_interval) => {
                drained?;
                info!("Cache drained by sweeper");
            }
            _ = signal::ctrl_c() => info!("Received Ctrl+C, stopping early"),
        }
    } else {
        warn!("Sweeper is {:?}, entries will not expire", cache.sweeper_state());
        print!("{}", cache.dump()?);
    }

    println!("{}", serde_json::to_string_pretty(&cache.stats())?);

    cache.destroy().await;
    Ok(())
}

/// Dumps the cache every sweep interval until it is empty.
async fn drain(cache: &Cache<String, usize>, sweep_interval: Duration) -> anyhow::Result<()> {
    while !cache.is_empty() {
        info!("{} entries remaining", cache.len());
        print!("{}", cache.dump()?);
        tokio::time::sleep(sweep_interval).await;
    }
    Ok(())
}
