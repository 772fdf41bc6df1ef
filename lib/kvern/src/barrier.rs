use std::sync::{Condvar, Mutex};

use crate::utils::die;

/// Rendezvous for exactly `n` threads, reusable across generations.
///
/// The n-th arrival of a generation resets the count and bumps the
/// generation, releasing all waiters; the barrier is immediately usable
/// again with no re-arm step.
pub(crate) struct Barrier {
    state: Mutex<BarrierState>,
    cv: Condvar,
    n: usize,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
}

impl Barrier {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            cv: Condvar::new(),
            n,
        }
    }

    /// Blocks until `n` threads have arrived in the current generation.
    pub(crate) fn arrive(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => die("barrier mutex poisoned"),
        };
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.n {
            state.arrived = 0;
            state.generation += 1;
            self.cv.notify_all();
            return;
        }
        // Condvar wakeups can be spurious; the generation is the truth.
        while state.generation == generation {
            state = match self.cv.wait(state) {
                Ok(guard) => guard,
                Err(_) => die("barrier condvar wait failed"),
            };
        }
    }
}
