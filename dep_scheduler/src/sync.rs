//! Concurrency primitives (§5.1): a re-entrancy assertion and a counting
//! semaphore, both hand-rolled over the standard library the way
//! low-level sync primitives are, rather than pulled in as a one-off
//! dependency for each.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::SchedulerError;

/// Asserts that `job_finished` is not entered while a prior call on the
/// same scheduler is still running, per §5's documented-serial callback
/// contract. A violation is a caller bug, not a recoverable race — it is
/// reported as a `SchedulerError`, not panicked, only because the
/// scheduler's public methods are fallible throughout and a caller may
/// want to log and abort the build cleanly rather than unwind.
pub struct ReentrancyGuard(AtomicBool);

impl ReentrancyGuard {
    pub fn new() -> Self {
        ReentrancyGuard(AtomicBool::new(false))
    }

    pub fn enter(&self) -> Result<ReentrancyGuardHandle<'_>, SchedulerError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ReentrancyGuardHandle(&self.0))
            .map_err(|_| SchedulerError::ReentrantJobCompletion)
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        ReentrancyGuard::new()
    }
}

pub struct ReentrancyGuardHandle<'a>(&'a AtomicBool);

impl Drop for ReentrancyGuardHandle<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Signaled once when `incompleteFirstWaveInputs` becomes empty; the
/// dispatch loop waits on it before launching the second wave. Extra
/// signals just leave spare permits behind — harmless, per §5.
pub struct CountingSemaphore {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl CountingSemaphore {
    pub fn new() -> Self {
        CountingSemaphore { count: Mutex::new(0), condvar: Condvar::new() }
    }

    pub fn signal(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.condvar.notify_all();
    }

    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.condvar.wait(count).unwrap();
        }
        *count -= 1;
    }
}

impl Default for CountingSemaphore {
    fn default() -> Self {
        CountingSemaphore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrancy_guard_rejects_nested_entry() {
        let guard = ReentrancyGuard::new();
        let outer = guard.enter().unwrap();
        assert!(matches!(guard.enter(), Err(SchedulerError::ReentrantJobCompletion)));
        drop(outer);
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn semaphore_extra_signals_are_harmless() {
        let sem = CountingSemaphore::new();
        sem.signal();
        sem.signal();
        sem.wait();
        sem.wait();
        // A third wait would block forever; two signals, two waits, done.
    }
}
