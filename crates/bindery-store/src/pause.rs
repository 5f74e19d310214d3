//! Cooperative pause shared between multi-transaction jobs.
//!
//! A bulk job (population, thumbnail generation, missing-item repair) holds
//! the pause for its whole run. Other bulk jobs block in `pause` until it is
//! released, and lighter workers block at their `wait_if_paused`
//! checkpoints. The engine only serializes individual write transactions;
//! this serializes whole jobs.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct PauseController {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl PauseController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other job holds the pause, then take it. The pause is
    /// released when the guard drops.
    #[must_use = "the pause is released as soon as the guard is dropped"]
    pub fn pause(&self) -> PauseGuard {
        let (lock, cvar) = &*self.state;
        let mut paused = lock.lock();
        while *paused {
            cvar.wait(&mut paused);
        }
        *paused = true;
        PauseGuard {
            controller: self.clone(),
        }
    }

    /// Checkpoint: return immediately unless a job holds the pause
    pub fn wait_if_paused(&self) {
        let (lock, cvar) = &*self.state;
        let mut paused = lock.lock();
        while *paused {
            cvar.wait(&mut paused);
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.state.0.lock()
    }

    fn resume(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock() = false;
        cvar.notify_all();
    }
}

/// Held by the job that owns the pause
pub struct PauseGuard {
    controller: PauseController,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.controller.resume();
    }
}
