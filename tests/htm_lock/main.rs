//! HtmLock Integration Tests
//!
//! Tests for htmbench-concurrency: mutual exclusion on every acquire path,
//! escalation visibility, capacity escalation and profiling counters.

#[path = "../common/mod.rs"]
mod common;

mod escalation;
mod mutual_exclusion;
mod profile;
