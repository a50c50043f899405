//! # htmbench
//!
//! Hybrid hardware-transactional locking and a pinned multi-threaded
//! transaction benchmark harness.
//!
//! ## Quick Start
//!
//! ```no_run
//! use htmbench::prelude::*;
//! use htmbench::workloads::{MicroConfig, MicroWorkload};
//! use std::sync::Arc;
//!
//! let workload = MicroWorkload::new(MicroConfig::default());
//! let lock = Arc::clone(workload.lock());
//! let source = workload.generate(4, 10_000, 64, 7);
//!
//! let report = DistExecutor::builder(workload)
//!     .threads(4)
//!     .htm_lock(lock)
//!     .batch_source(source)
//!     .build()?
//!     .start()?;
//! println!("{}", report.to_json());
//! # Ok::<(), htmbench::Error>(())
//! ```
//!
//! ## Layers
//!
//! - [`HtmLock`] - lock elision over a spin lock, with per-instruction-set
//!   backends ([`Rtm`], [`Power`], [`Emulated`])
//! - [`DistExecutor`] - runs a [`Workload`] on pinned workers with a startup
//!   barrier and reports throughput and abort rate
//! - [`workloads`] - reference workloads for tests and benchmarks
//!
//! ## Cargo features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `rtm` | Intel RTM becomes [`DefaultBackend`] on x86_64 |
//! | `power-htm` | IBM POWER HTM becomes [`DefaultBackend`] on powerpc64 (nightly) |
//! | `htm-profile` | per-lock abort counters, printed with the run report |

#![warn(missing_docs)]

pub mod prelude;
pub mod workloads;

// Errors and identifiers
pub use htmbench_core::{
    decode_param, encode_param, CoreId, Error, NodeId, ParamBatch, Result, RunId, ThreadId,
    TxnParam, TxnType,
};

// Lock
pub use htmbench_concurrency::{
    AbortCause, AbortInjection, AbortStatus, Acquisition, CapacityCoupling, DefaultBackend,
    Emulated, HtmBackend, HtmGuard, HtmLock, LockStatsSnapshot, Power, RetryLimits, Rtm,
    SpinLock, LOCK_HELD_ABORT_CODE,
};

// Harness
pub use htmbench_executor::{
    AffinityResolver, BatchSource, BoundedRetry, CoreMap, DistExecutor, DistExecutorBuilder,
    ExecutionContext, ExecutorConfig, InMemoryBatchSource, NoPinning, ProcedureRegistry,
    RetryPolicy, RetryUntilCommitted, RunReport, StoredProcedure, TransactionManager, TxnOutcome,
    WorkerInfo, Workload,
};
