//! Background Tasks Module
//!
//! Contains the background task that runs alongside each cache.
//!
//! # Tasks
//! - TTL Sweeper: Evicts idle cache entries at the configured interval

mod sweeper;

pub use sweeper::{Sweeper, SweeperState};
