//! Benchmark harness for htmbench
//!
//! [`DistExecutor`] runs a [`Workload`] on a fixed pool of pinned worker
//! threads:
//!
//! - every worker rebuilds its input batches as private copies, then waits
//!   at a startup barrier so the timed region starts together
//! - aborted transactions are retried according to a [`RetryPolicy`]
//! - the first worker to exhaust its input records the end of the timed
//!   region and tells the others to stop
//! - committed and aborted counts are aggregated into a [`RunReport`]
//!
//! Collaborators plug in through traits: [`Workload`], [`StoredProcedure`],
//! [`TransactionManager`], [`BatchSource`], [`AffinityResolver`] and
//! [`RetryPolicy`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod affinity;
pub mod context;
pub mod executor;
pub mod report;
pub mod retry;
pub mod run_state;
pub mod source;
mod worker;
pub mod workload;

#[cfg(test)]
mod tests;

pub use affinity::{pin_current_thread, AffinityResolver, CoreMap, NoPinning};
pub use context::ExecutionContext;
pub use executor::{
    DistExecutor, DistExecutorBuilder, ExecutorConfig, DEFAULT_OUTPUT_CAPACITY, DEFAULT_SEED,
};
pub use report::RunReport;
pub use retry::{BoundedRetry, RetryPolicy, RetryUntilCommitted};
pub use run_state::RunState;
pub use source::{BatchSource, InMemoryBatchSource};
pub use workload::{
    ProcedureFactory, ProcedureRegistry, ProcedureSet, StoredProcedure, TransactionManager,
    TxnOutcome, WorkerInfo, Workload,
};
