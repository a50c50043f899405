//! Concurrent increments under the lock must never lose an update.

use crate::common::*;
use htmbench::{AbortInjection, AbortStatus, Emulated, HtmLock, RetryLimits};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;
const ITERATIONS: u64 = 2_000;

/// Read-modify-write split into a load and a store, so only the lock keeps
/// increments from being lost.
fn hammer(lock: Arc<HtmLock<Emulated>>) -> u64 {
    let counter = Arc::new(AtomicU64::new(0));
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..ITERATIONS {
                    let _guard = lock.lock();
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!lock.is_fallback_held());
    counter.load(Ordering::SeqCst)
}

#[test]
fn speculative_path_loses_no_updates() {
    init_tracing();
    let total = hammer(emulated_lock());
    assert_eq!(total, THREADS as u64 * ITERATIONS);
}

#[test]
fn forced_fallback_loses_no_updates() {
    init_tracing();
    let lock = fallback_only_lock();
    let total = hammer(Arc::clone(&lock));
    assert_eq!(total, THREADS as u64 * ITERATIONS);
    assert_eq!(lock.backend().commits(), 0);
}

#[test]
fn mixed_paths_lose_no_updates() {
    init_tracing();
    // Every third begin hits a capacity abort and every such acquire
    // escalates, so speculative and fallback holders interleave.
    let backend = Emulated::with_injection(AbortInjection::EveryNth {
        n: 3,
        status: AbortStatus::capacity(),
    });
    let lock = Arc::new(HtmLock::with_backend(backend, RetryLimits::new(100, 1)));
    let total = hammer(Arc::clone(&lock));
    assert_eq!(total, THREADS as u64 * ITERATIONS);
    assert!(lock.backend().commits() > 0);
}