//! In-flight Creation Module
//!
//! Per-key markers that let concurrent get-or-create misses share a single
//! creator call. The first caller to miss (the leader) runs the creator; the
//! others (followers) block until the leader publishes a value or gives up.

use parking_lot::{Condvar, Mutex};

// == Flight State ==
#[derive(Debug)]
enum FlightState<V> {
    /// The leader is still running the creator
    Pending,
    /// The leader installed this value
    Ready(V),
    /// The leader failed, panicked, or the cache was destroyed
    Abandoned,
}

// == Flight ==
/// A single in-progress creation, shared between the leader and its followers.
#[derive(Debug)]
pub(crate) struct Flight<V> {
    state: Mutex<FlightState<V>>,
    settled: Condvar,
}

impl<V> Flight<V> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Pending),
            settled: Condvar::new(),
        }
    }

    // == Complete ==
    /// Publishes the leader's value and wakes every follower.
    pub(crate) fn complete(&self, value: V) {
        let mut state = self.state.lock();
        if matches!(*state, FlightState::Pending) {
            *state = FlightState::Ready(value);
        }
        self.settled.notify_all();
    }

    // == Abandon ==
    /// Wakes every follower without a value; a no-op once settled.
    pub(crate) fn abandon(&self) {
        let mut state = self.state.lock();
        if matches!(*state, FlightState::Pending) {
            *state = FlightState::Abandoned;
        }
        self.settled.notify_all();
    }
}

impl<V: Clone> Flight<V> {
    // == Wait ==
    /// Blocks until the flight settles.
    ///
    /// Returns the leader's value, or `None` if the flight was abandoned and
    /// the caller should retry the miss path itself.
    pub(crate) fn wait(&self) -> Option<V> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                FlightState::Ready(value) => return Some(value.clone()),
                FlightState::Abandoned => return None,
                FlightState::Pending => {}
            }
            self.settled.wait(&mut state);
        }
    }
}
