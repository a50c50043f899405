//! Convenient imports for htmbench.
//!
//! ```ignore
//! use htmbench::prelude::*;
//!
//! let lock: HtmLock = HtmLock::new();
//! let _guard = lock.lock();
//! ```

// Error handling
pub use crate::{Error, Result};

// Lock
pub use crate::{HtmGuard, HtmLock, RetryLimits};

// Harness
pub use crate::{
    DistExecutor, ExecutionContext, InMemoryBatchSource, ProcedureRegistry, RunReport,
    StoredProcedure, TransactionManager, TxnOutcome, WorkerInfo, Workload,
};

// Parameters
pub use crate::{ParamBatch, TxnParam, TxnType};
