//! Micro workload runs on several workers.

use crate::common::*;
use htmbench::workloads::{MicroConfig, MicroParam, MicroWorkload};
use htmbench::{DistExecutor, HtmLock, InMemoryBatchSource, RetryLimits};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const SLOTS: usize = 8;
const INITIAL: i64 = 1_000;

/// Transfers only, so the table sum is fixed no matter how many run.
fn transfers(threads: usize, per_thread: usize) -> InMemoryBatchSource<MicroParam> {
    let params = (0..threads)
        .map(|thread| {
            let mut rng = SmallRng::seed_from_u64(thread as u64);
            (0..per_thread)
                .map(|_| MicroParam::Transfer {
                    from: rng.gen_range(0..SLOTS),
                    to: rng.gen_range(0..SLOTS),
                    amount: rng.gen_range(1..=50),
                })
                .collect()
        })
        .collect();
    InMemoryBatchSource::from_params(params, 32)
}

fn config(abort_every: u64) -> MicroConfig {
    MicroConfig {
        slots: SLOTS,
        initial_value: INITIAL,
        abort_every,
    }
}

fn run_transfers(lock: Arc<HtmLock>, threads: usize, per_thread: usize) {
    let workload = MicroWorkload::with_lock(config(0), Arc::clone(&lock));
    let table = Arc::clone(workload.table());

    let report = DistExecutor::builder(workload)
        .threads(threads)
        .htm_lock(lock)
        .batch_source(transfers(threads, per_thread))
        .build()
        .unwrap()
        .start()
        .unwrap();

    assert!(report.execute_count > 0);
    assert!(report.execute_count <= (threads * per_thread) as u64);
    assert_eq!(report.abort_count, 0);
    assert_eq!(table.sum(), SLOTS as i64 * INITIAL);
}

#[test]
fn transfers_preserve_sum_speculative() {
    init_tracing();
    run_transfers(Arc::new(HtmLock::new()), 4, 5_000);
}

#[test]
fn transfers_preserve_sum_forced_fallback() {
    init_tracing();
    run_transfers(
        Arc::new(HtmLock::with_limits(RetryLimits::fallback_only())),
        4,
        5_000,
    );
}

#[test]
fn single_worker_runs_everything() {
    init_tracing();
    let workload = MicroWorkload::new(config(0));
    let table = Arc::clone(workload.table());
    let params = vec![(0..100)
        .map(|i| MicroParam::Increment {
            slot: i % SLOTS,
            delta: 1,
        })
        .collect()];

    let report = DistExecutor::builder(workload)
        .batch_source(InMemoryBatchSource::from_params(params, 16))
        .build()
        .unwrap()
        .start()
        .unwrap();

    assert_eq!(report.execute_count, 100);
    assert_eq!(report.abort_count, 0);
    assert_eq!(report.abort_rate(), 0.0);
    assert_eq!(table.sum(), SLOTS as i64 * INITIAL + 100);
}

#[test]
fn injected_aborts_are_retried() {
    init_tracing();
    // Every first attempt aborts and every retry commits.
    let workload = MicroWorkload::new(config(1));
    let threads = 4;

    let report = DistExecutor::builder(workload)
        .threads(threads)
        .batch_source(transfers(threads, 10))
        .build()
        .unwrap()
        .start()
        .unwrap();

    // Workers stopped by another's finish may leave one abort unretried.
    assert!(report.execute_count <= 40);
    assert!(report.abort_count >= report.execute_count);
    assert!(report.abort_count <= report.execute_count + threads as u64);
}

#[test]
fn single_worker_injected_aborts_exact() {
    init_tracing();
    let workload = MicroWorkload::new(config(1));

    let report = DistExecutor::builder(workload)
        .batch_source(transfers(1, 10))
        .build()
        .unwrap()
        .start()
        .unwrap();

    assert_eq!(report.execute_count, 10);
    assert_eq!(report.abort_count, 10);
    assert_eq!(report.abort_rate(), 10.0 / 11.0);
}
