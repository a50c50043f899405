//! Escalation to the fallback lock and its visibility to speculative holders.

use crate::common::*;
use htmbench::{
    AbortInjection, AbortStatus, CapacityCoupling, Emulated, HtmLock, RetryLimits,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn always(status: AbortStatus, limits: RetryLimits) -> HtmLock<Emulated> {
    HtmLock::with_backend(Emulated::with_injection(AbortInjection::Always(status)), limits)
}

#[test]
fn capacity_escalates_after_exact_budget() {
    init_tracing();
    let lock = always(AbortStatus::capacity(), RetryLimits::RTM);
    let acquisition = lock.acquire();
    assert!(acquisition.is_fallback());
    assert_eq!(lock.backend().begin_attempts(), RetryLimits::RTM.capacity_retries as u64);
    lock.release(acquisition);
    assert!(!lock.is_fallback_held());
}

#[test]
fn power_limits_ignore_retry_hint() {
    // POWER limits ignore the retry hint, so a non-retryable conflict still
    // uses the full budget.
    let lock = always(AbortStatus::conflict().with_retry(false), RetryLimits::POWER);
    lock.release(lock.acquire());
    assert_eq!(lock.backend().begin_attempts(), RetryLimits::POWER.conflict_retries as u64);
}

#[test]
fn independent_capacity_budget() {
    let limits = RetryLimits::new(2, 6).with_coupling(CapacityCoupling::Independent);
    let lock = always(AbortStatus::capacity(), limits);
    lock.release(lock.acquire());
    assert_eq!(lock.backend().begin_attempts(), 6);
}

#[test]
fn no_speculative_commit_while_fallback_held() {
    init_tracing();
    // The first begin hits a capacity abort, which with a budget of one
    // sends this thread to the fallback lock.
    let backend = Emulated::with_injection(AbortInjection::FirstN {
        count: 1,
        status: AbortStatus::capacity(),
    });
    let lock = Arc::new(HtmLock::with_backend(backend, RetryLimits::new(100, 1)));
    let held = lock.acquire();
    assert!(held.is_fallback());

    let stop = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut acquired = 0u64;
                while !stop.load(Ordering::Acquire) {
                    let _guard = lock.lock();
                    acquired += 1;
                }
                acquired
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert_eq!(lock.backend().commits(), 0);
    assert!(lock.is_fallback_held());

    lock.release(held);
    thread::sleep(Duration::from_millis(10));
    stop.store(true, Ordering::Release);
    let acquired: u64 = workers.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(acquired > 0);
    assert!(lock.backend().commits() > 0);
}

#[test]
fn fallback_waits_for_inflight_speculation() {
    init_tracing();
    let lock = emulated_lock();
    let speculative = lock.lock();
    assert!(speculative.is_speculative());

    let acquired = Arc::new(AtomicBool::new(false));
    let escalating = {
        let lock = Arc::clone(&lock);
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || {
            // The token is busy, so every begin conflicts and the acquire
            // escalates; the drain then waits for the speculative holder.
            let acquisition = lock.acquire();
            acquired.store(true, Ordering::SeqCst);
            let fallback = acquisition.is_fallback();
            lock.release(acquisition);
            fallback
        })
    };

    thread::sleep(Duration::from_millis(30));
    assert!(!acquired.load(Ordering::SeqCst));
    drop(speculative);
    assert!(escalating.join().unwrap());
    assert!(acquired.load(Ordering::SeqCst));
}
