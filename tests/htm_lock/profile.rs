//! Profiling counters, compiled in with `htm-profile`.

use htmbench::{AbortInjection, AbortStatus, Emulated, HtmLock, RetryLimits};
#[cfg(feature = "htm-profile")]
use htmbench::AbortCause;

#[cfg(feature = "htm-profile")]
#[test]
fn capacity_escalation_counts_one_fallback() {
    let backend = Emulated::with_injection(AbortInjection::Always(AbortStatus::capacity()));
    let lock = HtmLock::with_backend(backend, RetryLimits::new(100, 10));
    lock.release(lock.acquire());

    let stats = lock.stats().unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.fallback, 1);
    assert_eq!(stats.aborts(AbortCause::Capacity), 10);
    assert_eq!(stats.speculative(), 0);
    assert_eq!(stats.fallback_rate(), 1.0);
}

#[cfg(feature = "htm-profile")]
#[test]
fn transient_conflicts_then_commit() {
    let backend = Emulated::with_injection(AbortInjection::FirstN {
        count: 2,
        status: AbortStatus::conflict(),
    });
    let lock = HtmLock::with_backend(backend, RetryLimits::RTM);
    for _ in 0..3 {
        lock.release(lock.acquire());
    }

    let stats = lock.stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.fallback, 0);
    assert_eq!(stats.aborts(AbortCause::Conflict), 2);
    assert!(stats.to_string().contains("lock count=3"));
}

#[cfg(feature = "htm-profile")]
#[test]
fn futile_hint_escalations_are_counted() {
    let backend = Emulated::with_injection(AbortInjection::Always(AbortStatus::other()));
    let lock = HtmLock::with_backend(backend, RetryLimits::RTM);
    for _ in 0..4 {
        lock.release(lock.acquire());
    }

    let stats = lock.stats().unwrap();
    assert_eq!(stats.fallback, 4);
    assert_eq!(stats.retry_hint, 4);
    assert_eq!(stats.aborts(AbortCause::Other), 4);
    let text = stats.to_string();
    assert!(text.contains("retry_count=4"), "{}", text);
    assert!(text.contains("retry rate=1.000000"), "{}", text);
}

#[cfg(not(feature = "htm-profile"))]
#[test]
fn stats_absent_without_profile() {
    let backend = Emulated::with_injection(AbortInjection::Always(AbortStatus::capacity()));
    let lock = HtmLock::with_backend(backend, RetryLimits::RTM);
    lock.release(lock.acquire());
    assert!(lock.stats().is_none());
}
