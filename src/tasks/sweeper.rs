//! TTL Sweeper Task
//!
//! Background task that periodically evicts cache entries idle for longer
//! than the TTL.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

// == Sweeper State ==
/// Lifecycle of the background sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SweeperState {
    /// Suppressed by configuration
    Disabled = 0,
    /// Could not be started (no tokio runtime); entries are never swept
    Unavailable = 1,
    Running = 2,
    /// Stop requested, task not yet exited
    Stopping = 3,
    /// Task has exited and will not touch the store again
    Stopped = 4,
}

impl SweeperState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SweeperState::Disabled,
            1 => SweeperState::Unavailable,
            2 => SweeperState::Running,
            3 => SweeperState::Stopping,
            _ => SweeperState::Stopped,
        }
    }
}

// == Sweeper Control ==
/// Stop flag plus wake signal shared by the sweeper task and its owner.
#[derive(Debug)]
struct SweeperControl {
    state: AtomicU8,
    wake: Notify,
}

impl SweeperControl {
    fn new(state: SweeperState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
            wake: Notify::new(),
        }
    }

    fn state(&self) -> SweeperState {
        SweeperState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn should_stop(&self) -> bool {
        self.state() != SweeperState::Running
    }

    /// Moves Running to Stopping and wakes the task. Returns false if the
    /// sweeper was not running.
    fn request_stop(&self) -> bool {
        let requested = self
            .state
            .compare_exchange(
                SweeperState::Running as u8,
                SweeperState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if requested {
            // notify_one stores a permit, so a task between sleeps still sees it
            self.wake.notify_one();
        }
        requested
    }

    fn mark_stopped(&self) {
        self.state
            .store(SweeperState::Stopped as u8, Ordering::Release);
    }
}

// == Sweeper ==
/// Handle to the background sweeper bound to one cache store.
pub struct Sweeper {
    control: Arc<SweeperControl>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweeper")
            .field("state", &self.state())
            .finish()
    }
}

impl Sweeper {
    /// A sweeper that was never started because configuration suppressed it.
    pub fn disabled() -> Self {
        Self::idle(SweeperState::Disabled)
    }

    fn idle(state: SweeperState) -> Self {
        Self {
            control: Arc::new(SweeperControl::new(state)),
            task: Mutex::new(None),
        }
    }

    // == Spawn ==
    /// Spawns the sweeper on the current tokio runtime.
    ///
    /// Without a runtime the sweeper is reported as `Unavailable` and the
    /// store is never swept in the background.
    pub fn spawn<K, V>(store: Arc<CacheStore<K, V>>, interval: Duration) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!("Sweeper not started, cache entries will not expire: {}", err);
                return Self::idle(SweeperState::Unavailable);
            }
        };

        let control = Arc::new(SweeperControl::new(SweeperState::Running));
        let task = runtime.spawn(run(store, Arc::clone(&control), interval));

        Self {
            control,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn state(&self) -> SweeperState {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SweeperState::Running
    }

    // == Signal Stop ==
    /// Asks the sweeper to stop without waiting for it.
    pub fn signal_stop(&self) {
        self.control.request_stop();
    }

    // == Stop ==
    /// Asks the sweeper to stop and waits up to `grace` for it to exit.
    ///
    /// If the task does not exit in time it is aborted. Either way the
    /// sweeper is `Stopped` when this returns. Repeated calls are no-ops.
    pub async fn stop(&self, grace: Duration) -> SweeperState {
        self.control.request_stop();

        let task = self.task.lock().take();
        let Some(mut task) = task else {
            return self.state();
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => debug!("Sweeper exited cleanly"),
            Ok(Err(err)) => {
                warn!("Sweeper task failed: {}", err);
                self.control.mark_stopped();
            }
            Err(_) => {
                warn!(
                    "Sweeper did not stop within {:?}, aborting it",
                    grace
                );
                task.abort();
                self.control.mark_stopped();
            }
        }
        self.state()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.control.request_stop();
    }
}

/// Marks the sweeper `Stopped` however its task ends: return, panic or abort.
struct StopOnExit(Arc<SweeperControl>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("TTL sweeper panicked, cache entries will no longer expire");
        }
        self.0.mark_stopped();
    }
}

/// The sweeper loop: sleep, check the stop flag, sweep.
async fn run<K, V>(store: Arc<CacheStore<K, V>>, control: Arc<SweeperControl>, interval: Duration)
where
    K: Eq + Hash + Clone,
{
    let _exit = StopOnExit(Arc::clone(&control));
    info!(
        "Starting TTL sweeper with interval of {:?} and ttl of {:?}",
        interval,
        store.ttl()
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = control.wake.notified() => {}
        }

        // The store may already be released once a stop is requested
        if control.should_stop() {
            break;
        }

        let evicted = store.sweep(|| control.should_stop());
        if evicted > 0 {
            info!("TTL sweep: evicted {} idle entries", evicted);
        } else {
            debug!("TTL sweep: no idle entries found");
        }
    }

    info!("TTL sweeper stopped");
}
