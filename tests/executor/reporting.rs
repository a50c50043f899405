//! Run report contents.

use crate::common::*;
use htmbench::workloads::{MicroConfig, MicroWorkload};
use htmbench::{DistExecutor, ExecutorConfig};
use std::sync::Arc;

#[test]
fn report_carries_run_metadata() {
    init_tracing();
    let workload = MicroWorkload::new(MicroConfig::default());
    let lock = Arc::clone(workload.lock());
    let source = workload.generate(2, 500, 50, 3);

    let report = DistExecutor::builder(workload)
        .config(ExecutorConfig {
            threads: 2,
            ..Default::default()
        })
        .htm_lock(lock)
        .batch_source(source)
        .build()
        .unwrap()
        .start()
        .unwrap();

    assert_eq!(report.thread_count, 2);
    assert!(report.started_at.timestamp() > 0);

    let json = report.to_json();
    assert_eq!(json["run_id"], report.run_id.to_string());
    assert_eq!(json["execute_count"], report.execute_count);
    assert_eq!(json["lock_stats"].is_null(), !cfg!(feature = "htm-profile"));

    let text = report.to_string();
    assert!(text.starts_with(&format!(
        "execute_count={}, abort_count={}",
        report.execute_count, report.abort_count
    )));
    assert!(text.contains("per-core throughput="));
}

#[test]
fn distinct_runs_get_distinct_ids() {
    let run = || {
        let workload = MicroWorkload::new(MicroConfig::default());
        let source = workload.generate(1, 10, 10, 1);
        DistExecutor::builder(workload)
            .batch_source(source)
            .build()
            .unwrap()
            .start()
            .unwrap()
    };
    assert_ne!(run().run_id, run().run_id);
}
