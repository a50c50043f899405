//! Software emulation of a transactional-memory backend
//!
//! Speculation is modelled by a per-backend token: `begin` takes it, `commit`
//! or `abort` releases it, and a context that cannot take it sees a conflict
//! abort. Hardware aborts speculative readers of the fallback lock the moment
//! the lock word is written; the emulation gets the same exclusion from
//! [`HtmBackend::after_fallback_acquired`], which waits for the token to
//! drain. Both sides issue a SeqCst fence between their own write (token or
//! lock word) and their read of the other, so at least one of them observes
//! the other.
//!
//! Abort injection forces begin failures with a chosen status, which lets
//! tests drive the capacity, conflict and explicit paths deterministically.

use super::{Begin, HtmBackend};
use crate::limits::RetryLimits;
use crate::status::AbortStatus;
use crossbeam_utils::{Backoff, CachePadded};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

/// Which begin attempts fail, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbortInjection {
    /// Never inject
    #[default]
    None,
    /// Every attempt aborts with the status
    Always(AbortStatus),
    /// The first `count` attempts (across all contexts) abort with the status
    FirstN {
        /// Number of failing attempts
        count: u64,
        /// Status reported
        status: AbortStatus,
    },
    /// Every `n`-th attempt (1-based) aborts with the status
    EveryNth {
        /// Period; zero disables injection
        n: u64,
        /// Status reported
        status: AbortStatus,
    },
}

impl AbortInjection {
    /// Status injected for the zero-based attempt number, if any
    #[inline]
    fn status_for(&self, attempt: u64) -> Option<AbortStatus> {
        match *self {
            AbortInjection::None => None,
            AbortInjection::Always(status) => Some(status),
            AbortInjection::FirstN { count, status } => (attempt < count).then_some(status),
            AbortInjection::EveryNth { n, status } => {
                (n != 0 && (attempt + 1) % n == 0).then_some(status)
            }
        }
    }
}

/// Software transactional backend
#[derive(Debug, Default)]
pub struct Emulated {
    token: CachePadded<AtomicBool>,
    injection: AbortInjection,
    begins: AtomicU64,
    commits: AtomicU64,
}

impl Emulated {
    /// Create a backend without abort injection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that injects aborts
    pub fn with_injection(injection: AbortInjection) -> Self {
        Self {
            injection,
            ..Self::default()
        }
    }

    /// Total `begin` calls so far, including injected failures
    pub fn begin_attempts(&self) -> u64 {
        self.begins.load(Ordering::Relaxed)
    }

    /// Total speculative commits so far
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    /// Check whether a speculative section is in flight
    pub fn is_speculating(&self) -> bool {
        self.token.load(Ordering::Acquire)
    }
}

unsafe impl HtmBackend for Emulated {
    const NAME: &'static str = "emulated";
    const DEFAULT_LIMITS: RetryLimits = RetryLimits::RTM;

    #[inline]
    unsafe fn begin(&self) -> Begin {
        let attempt = self.begins.fetch_add(1, Ordering::Relaxed);
        if let Some(status) = self.injection.status_for(attempt) {
            return Begin::Aborted(status);
        }
        if self
            .token
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Begin::Aborted(AbortStatus::conflict());
        }
        // Pairs with the fence in after_fallback_acquired.
        fence(Ordering::SeqCst);
        Begin::Started
    }

    #[inline]
    unsafe fn commit(&self) {
        self.commits.fetch_add(1, Ordering::Release);
        self.token.store(false, Ordering::Release);
    }

    #[inline]
    unsafe fn abort(&self) {
        self.token.store(false, Ordering::Release);
    }

    fn after_fallback_acquired(&self) {
        fence(Ordering::SeqCst);
        let backoff = Backoff::new();
        while self.token.load(Ordering::Acquire) {
            backoff.snooze();
        }
    }
}
