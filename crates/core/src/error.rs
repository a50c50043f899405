//! Unified error types for htmbench.
//!
//! Transaction aborts and hardware aborts are *not* errors: the first is an
//! expected outcome the harness retries, the second is resolved inside the
//! lock. Everything here is either a configuration problem detected before
//! the timed region starts or a collaborator failure surfaced after it.

use crate::types::{ThreadId, TxnType};
use thiserror::Error;

/// All htmbench errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter carries a tag with no registered stored procedure
    #[error("unregistered transaction type {txn_type} on {thread}")]
    UnregisteredTxnType {
        /// Offending tag
        txn_type: TxnType,
        /// Worker that found it during setup
        thread: ThreadId,
    },

    /// Affinity map could not resolve a core or NUMA node
    #[error("invalid affinity map: {0}")]
    InvalidAffinity(String),

    /// Invalid harness or lock configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A parameter failed to serialize or deserialize
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A worker panicked (a collaborator faulted outside the harness contract)
    #[error("worker {thread} panicked")]
    WorkerPanicked {
        /// Worker that panicked
        thread: ThreadId,
    },

    /// The run was cancelled before the timed region began
    #[error("run cancelled: {0}")]
    Cancelled(String),
}

/// Result type for htmbench operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a setup-time configuration error.
    ///
    /// Configuration errors terminate the affected worker before the barrier
    /// opens, so no timed work has happened when they are reported.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnregisteredTxnType { .. } | Error::InvalidAffinity(_) | Error::InvalidConfig(_)
        )
    }

    /// Check if this is a serialization error.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
