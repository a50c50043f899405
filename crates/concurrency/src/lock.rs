//! Hybrid hardware-transactional lock
//!
//! [`HtmLock`] elides a [`SpinLock`]: the common case runs the critical
//! section inside a hardware transaction and never writes the lock word.
//! Only when speculation cannot make progress does a context take the spin
//! lock for real.
//!
//! ## Acquire
//!
//! ```text
//! for attempt in 0..conflict_retries:
//!     wait while fallback held
//!     begin
//!       started -> fallback free?  yes: return Speculative (transaction open)
//!                                   no: abort(0xff)
//!       aborted -> explicit 0xff : wait for fallback release
//!                  capacity      : capacity_aborts += 1, stop at capacity_retries
//!                  other         : stop if the hardware says retry is futile
//! take fallback -> Fallback
//! ```
//!
//! Reading the fallback word inside the transaction subscribes to it: a
//! context that escalates writes the word and aborts every speculative
//! holder, so speculative and fallback holders never overlap.
//!
//! ## Release
//!
//! The [`Acquisition`] returned by acquire records which path was taken;
//! release either commits the transaction or unlocks the spin lock, never
//! both.

use crate::backend::{Begin, DefaultBackend, HtmBackend, LOCK_HELD_ABORT_CODE};
use crate::limits::{CapacityCoupling, RetryLimits};
use crate::spinlock::SpinLock;
use crate::stats::{LockStats, LockStatsSnapshot};
use crate::status::{AbortCause, AbortStatus};
use crossbeam_utils::Backoff;
use std::marker::PhantomData;

/// Which path an acquire took
#[must_use = "an acquisition must be released"]
#[derive(Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// A hardware transaction is open on this thread
    Speculative,
    /// This thread holds the fallback spin lock
    Fallback,
}

impl Acquisition {
    /// Check whether the critical section is running speculatively
    pub fn is_speculative(&self) -> bool {
        matches!(self, Acquisition::Speculative)
    }

    /// Check whether the acquire escalated to the fallback lock
    pub fn is_fallback(&self) -> bool {
        matches!(self, Acquisition::Fallback)
    }
}

/// Mutual exclusion with a speculative fast path
///
/// The lock guards no data of its own; callers protect their shared state
/// by only touching it between acquire and release.
///
/// # Example
///
/// ```
/// use htmbench_concurrency::{Emulated, HtmLock};
///
/// let lock: HtmLock<Emulated> = HtmLock::new();
/// {
///     let _guard = lock.lock();
///     // critical section
/// }
/// assert!(!lock.is_fallback_held());
/// ```
#[derive(Debug)]
pub struct HtmLock<B: HtmBackend = DefaultBackend> {
    fallback: SpinLock,
    limits: RetryLimits,
    backend: B,
    stats: LockStats,
}

impl<B: HtmBackend + Default> HtmLock<B> {
    /// Create a lock with the backend's default retry limits
    pub fn new() -> Self {
        Self::with_backend(B::default(), B::DEFAULT_LIMITS)
    }

    /// Create a lock with explicit retry limits
    pub fn with_limits(limits: RetryLimits) -> Self {
        Self::with_backend(B::default(), limits)
    }
}

impl<B: HtmBackend + Default> Default for HtmLock<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: HtmBackend> HtmLock<B> {
    /// Create a lock around a configured backend
    pub fn with_backend(backend: B, limits: RetryLimits) -> Self {
        Self {
            fallback: SpinLock::new(),
            limits,
            backend,
            stats: LockStats::default(),
        }
    }

    /// Acquire the lock, returning a guard that releases on drop
    #[inline]
    pub fn lock(&self) -> HtmGuard<'_, B> {
        let acquisition = self.acquire();
        HtmGuard {
            lock: self,
            acquisition: Some(acquisition),
            _not_send: PhantomData,
        }
    }

    /// Acquire the lock
    ///
    /// The returned [`Acquisition`] must be passed to [`HtmLock::release`]
    /// on the same thread. Not reentrant.
    #[inline]
    pub fn acquire(&self) -> Acquisition {
        self.stats.record_attempt();

        let mut attempts = 0u32;
        let mut capacity_aborts = 0u32;
        while attempts < self.limits.conflict_retries {
            // Starting a transaction while someone holds the fallback lock
            // can only end in an abort.
            self.wait_for_fallback_release();

            let status = match unsafe { self.backend.begin() } {
                Begin::Started => {
                    if !self.fallback.is_locked() {
                        return Acquisition::Speculative;
                    }
                    unsafe { self.backend.abort() };
                    // Hardware resumes in begin(); only software backends get here.
                    AbortStatus::explicit(LOCK_HELD_ABORT_CODE)
                }
                Begin::Aborted(status) => status,
            };

            attempts += 1;
            let cause = status.cause();
            self.stats.record_abort(cause);

            match cause {
                AbortCause::Explicit if status.code() == Some(LOCK_HELD_ABORT_CODE) => {
                    self.wait_for_fallback_release();
                }
                AbortCause::Capacity => {
                    capacity_aborts += 1;
                    if capacity_aborts >= self.limits.capacity_retries {
                        break;
                    }
                    if self.limits.capacity_coupling == CapacityCoupling::Independent {
                        attempts -= 1;
                    }
                }
                _ => {
                    if self.limits.honor_retry_hint && !status.may_retry() {
                        self.stats.record_retry_hint();
                        break;
                    }
                }
            }
        }

        self.stats.record_fallback();
        self.fallback.lock();
        self.backend.after_fallback_acquired();
        Acquisition::Fallback
    }

    /// Release an acquisition taken on this thread
    #[inline]
    pub fn release(&self, acquisition: Acquisition) {
        match acquisition {
            Acquisition::Speculative => unsafe { self.backend.commit() },
            Acquisition::Fallback => self.fallback.unlock(),
        }
    }

    /// Check whether some context holds the fallback lock
    #[inline]
    pub fn is_fallback_held(&self) -> bool {
        self.fallback.is_locked()
    }

    /// Retry limits in force
    pub fn limits(&self) -> RetryLimits {
        self.limits
    }

    /// Backend instance
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend name
    pub fn backend_name(&self) -> &'static str {
        B::NAME
    }

    /// Profiling counters, `None` unless built with `htm-profile`
    pub fn stats(&self) -> Option<LockStatsSnapshot> {
        self.stats.snapshot()
    }

    #[inline]
    fn wait_for_fallback_release(&self) {
        if !self.fallback.is_locked() {
            return;
        }
        let backoff = Backoff::new();
        while self.fallback.is_locked() {
            backoff.snooze();
        }
    }
}

/// RAII guard for [`HtmLock`]
///
/// A transaction belongs to the thread that began it, so the guard cannot
/// leave that thread.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct HtmGuard<'a, B: HtmBackend = DefaultBackend> {
    lock: &'a HtmLock<B>,
    acquisition: Option<Acquisition>,
    _not_send: PhantomData<*const ()>,
}

impl<B: HtmBackend> HtmGuard<'_, B> {
    /// Check whether the guarded section is running speculatively
    pub fn is_speculative(&self) -> bool {
        matches!(self.acquisition, Some(Acquisition::Speculative))
    }
}

impl<B: HtmBackend> Drop for HtmGuard<'_, B> {
    fn drop(&mut self) {
        if let Some(acquisition) = self.acquisition.take() {
            self.lock.release(acquisition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AbortInjection, Emulated};

    static_assertions::assert_impl_all!(HtmLock<Emulated>: Send, Sync);
    static_assertions::assert_not_impl_any!(HtmGuard<'static, Emulated>: Send);

    fn injected(injection: AbortInjection, limits: RetryLimits) -> HtmLock<Emulated> {
        HtmLock::with_backend(Emulated::with_injection(injection), limits)
    }

    #[test]
    fn test_uncontended_acquire_is_speculative() {
        let lock: HtmLock<Emulated> = HtmLock::new();
        let acquisition = lock.acquire();
        assert!(acquisition.is_speculative());
        assert!(!lock.is_fallback_held());
        lock.release(acquisition);
        assert_eq!(lock.backend().commits(), 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock: HtmLock<Emulated> = HtmLock::new();
        {
            let guard = lock.lock();
            assert!(guard.is_speculative());
        }
        assert!(!lock.backend().is_speculating());
    }

    #[test]
    fn test_capacity_aborts_escalate_after_limit() {
        let lock = injected(
            AbortInjection::Always(AbortStatus::capacity()),
            RetryLimits::new(100, 10),
        );
        let acquisition = lock.acquire();
        assert!(acquisition.is_fallback());
        assert!(lock.is_fallback_held());
        assert_eq!(lock.backend().begin_attempts(), 10);
        lock.release(acquisition);
        assert!(!lock.is_fallback_held());
    }

    #[test]
    fn test_independent_coupling_exceeds_conflict_budget() {
        // Conflict budget 3, capacity budget 5: shared coupling stops at 3
        // attempts, independent coupling at 5.
        let shared = injected(
            AbortInjection::Always(AbortStatus::capacity()),
            RetryLimits::new(3, 5),
        );
        shared.release(shared.acquire());
        assert_eq!(shared.backend().begin_attempts(), 3);

        let independent = injected(
            AbortInjection::Always(AbortStatus::capacity()),
            RetryLimits::new(3, 5).with_coupling(CapacityCoupling::Independent),
        );
        independent.release(independent.acquire());
        assert_eq!(independent.backend().begin_attempts(), 5);
    }

    #[test]
    fn test_conflicts_consume_whole_budget() {
        let lock = injected(
            AbortInjection::Always(AbortStatus::conflict()),
            RetryLimits::new(7, 2),
        );
        let acquisition = lock.acquire();
        assert!(acquisition.is_fallback());
        assert_eq!(lock.backend().begin_attempts(), 7);
        lock.release(acquisition);
    }

    #[test]
    fn test_retry_hint_stops_early() {
        let lock = injected(
            AbortInjection::Always(AbortStatus::other()),
            RetryLimits::new(50, 10),
        );
        lock.release(lock.acquire());
        assert_eq!(lock.backend().begin_attempts(), 1);

        let ignoring = injected(
            AbortInjection::Always(AbortStatus::other()),
            RetryLimits::new(50, 10).with_retry_hint(false),
        );
        ignoring.release(ignoring.acquire());
        assert_eq!(ignoring.backend().begin_attempts(), 50);
    }

    #[test]
    fn test_transient_aborts_then_speculative() {
        let lock = injected(
            AbortInjection::FirstN {
                count: 3,
                status: AbortStatus::conflict(),
            },
            RetryLimits::new(10, 2),
        );
        let acquisition = lock.acquire();
        assert!(acquisition.is_speculative());
        assert_eq!(lock.backend().begin_attempts(), 4);
        lock.release(acquisition);
    }

    #[test]
    fn test_fallback_only_never_begins() {
        let lock: HtmLock<Emulated> = HtmLock::with_limits(RetryLimits::fallback_only());
        let acquisition = lock.acquire();
        assert!(acquisition.is_fallback());
        assert_eq!(lock.backend().begin_attempts(), 0);
        lock.release(acquisition);
    }

    #[test]
    fn test_speculation_aborts_while_fallback_held() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let lock: Arc<HtmLock<Emulated>> =
            Arc::new(HtmLock::with_limits(RetryLimits::fallback_only()));
        let held = lock.acquire();
        assert!(held.is_fallback());

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                let acquisition = lock.acquire();
                acquired.store(true, Ordering::SeqCst);
                lock.release(acquisition);
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!acquired.load(Ordering::SeqCst));
        lock.release(held);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[cfg(feature = "htm-profile")]
    #[test]
    fn test_profile_counts_single_fallback_per_acquire() {
        let lock = injected(
            AbortInjection::Always(AbortStatus::capacity()),
            RetryLimits::new(100, 10),
        );
        lock.release(lock.acquire());

        let stats = lock.stats().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.fallback, 1);
        assert_eq!(stats.aborts(AbortCause::Capacity), 10);
    }

    #[cfg(feature = "htm-profile")]
    #[test]
    fn test_profile_separates_retry_hint_from_budget() {
        let hinted = injected(
            AbortInjection::Always(AbortStatus::other()),
            RetryLimits::new(50, 10),
        );
        hinted.release(hinted.acquire());
        let stats = hinted.stats().unwrap();
        assert_eq!(stats.fallback, 1);
        assert_eq!(stats.retry_hint, 1);
        assert_eq!(stats.aborts(AbortCause::Other), 1);

        let exhausted = injected(
            AbortInjection::Always(AbortStatus::conflict()),
            RetryLimits::new(4, 2),
        );
        exhausted.release(exhausted.acquire());
        let stats = exhausted.stats().unwrap();
        assert_eq!(stats.fallback, 1);
        assert_eq!(stats.retry_hint, 0);
        assert_eq!(stats.aborts(AbortCause::Conflict), 4);
    }
}
