//! DistExecutor Integration Tests
//!
//! End-to-end runs of the micro workload: lock correctness under the
//! harness, abort accounting, reporting and parameter copies.

#[path = "../common/mod.rs"]
mod common;

mod micro_runs;
mod param_roundtrip;
mod reporting;
