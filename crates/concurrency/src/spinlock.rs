//! Test-and-set fallback lock
//!
//! The lock word is a single [`AtomicBool`]. Speculative critical sections
//! read it inside their hardware transaction, which puts the word in the
//! transaction's read set: acquiring the lock is a write to that word and
//! aborts every speculative holder.

use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicBool, Ordering};

/// Plain test-and-set blocking lock
///
/// Not reentrant. Unlocking a lock held by another context is a logic error
/// the lock cannot detect.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    /// Create an unlocked spin lock
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Check whether some context holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Acquire the lock, spinning until it is free
    #[inline]
    pub fn lock(&self) {
        let backoff = Backoff::new();
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            // Test before test-and-set: spin on a shared read, not on the RMW.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    /// Try to acquire the lock without spinning
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release the lock
    #[inline]
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}
