use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Process-wide set of jobs that are currently running.
///
/// Cloning shares the set, so every runner built from one `RunLocks` agrees on
/// what is in flight.
#[derive(Clone, Default, Debug)]
pub struct RunLocks {
    running: Arc<Mutex<HashSet<i64>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if the job is already running. The guard releases on drop.
    pub fn try_acquire(&self, job_id: i64) -> Option<RunGuard> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(job_id) {
            return None;
        }
        Some(RunGuard {
            job_id,
            running: Arc::clone(&self.running),
        })
    }

    pub fn is_running(&self, job_id: i64) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&job_id)
    }
}

#[derive(Debug)]
pub struct RunGuard {
    job_id: i64,
    running: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let locks = RunLocks::new();
        let shared = locks.clone();

        let guard = locks.try_acquire(7).unwrap();
        assert!(shared.try_acquire(7).is_none());
        assert!(shared.is_running(7));

        let other = shared.try_acquire(8);
        assert!(other.is_some());

        drop(guard);
        assert!(!locks.is_running(7));
        assert!(shared.try_acquire(7).is_some());
    }
}
