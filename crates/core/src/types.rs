//! Core identifiers
//!
//! This module defines the small identifier types used throughout the system:
//! - [`RunId`]: Unique identifier for one timed benchmark run
//! - [`ThreadId`]: Index of a worker thread inside the harness pool
//! - [`CoreId`]: Logical CPU a worker is pinned to
//! - [`NodeId`]: NUMA node owning a core
//! - [`TxnType`]: Tag selecting the stored procedure for a parameter
//!
//! A worker's core is resolved from its thread index through an affinity
//! map, so `CoreId` and `ThreadId` are deliberately distinct types even
//! though the identity mapping is common.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a benchmark run
///
/// RunId is attached to:
/// - The run's tracing span
/// - The final run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use htmbench_core::types::RunId;
    ///
    /// let id1 = RunId::new();
    /// let id2 = RunId::new();
    /// assert_ne!(id1, id2);
    /// ```
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! index_id {
    ($(#[$doc:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub $inner);

        impl $name {
            /// Raw index value
            #[inline]
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                $name(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

index_id!(
    /// Index of a worker thread, `0..thread_count`
    ThreadId(usize),
    "thread-"
);

index_id!(
    /// Logical CPU identifier
    CoreId(usize),
    "core-"
);

index_id!(
    /// NUMA node identifier
    NodeId(usize),
    "node-"
);

index_id!(
    /// Numeric transaction-type tag carried by every parameter
    ///
    /// The harness looks the tag up in the procedure registry to find the
    /// stored procedure that executes the parameter.
    TxnType(u32),
    "txn-"
);
