//! Retry policies for aborted transactions

use std::fmt::Debug;

/// Decides whether an aborted parameter is executed again
///
/// Consulted after every abort, once the finish flag has been checked.
pub trait RetryPolicy: Debug + Send + Sync {
    /// `aborts` counts the aborts of the current parameter so far (at least 1)
    fn should_retry(&self, aborts: u32) -> bool;
}

/// Retry until the transaction commits
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryUntilCommitted;

impl RetryPolicy for RetryUntilCommitted {
    #[inline]
    fn should_retry(&self, _aborts: u32) -> bool {
        true
    }
}

/// Give up on a parameter after a fixed number of aborts
///
/// A parameter dropped this way counts neither as committed nor as an
/// extra abort.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRetry {
    max_aborts: u32,
}

impl BoundedRetry {
    /// Allow at most `max_aborts` aborts per parameter
    pub fn new(max_aborts: u32) -> Self {
        Self { max_aborts }
    }

    /// Abort budget per parameter
    pub fn max_aborts(&self) -> u32 {
        self.max_aborts
    }
}

impl RetryPolicy for BoundedRetry {
    #[inline]
    fn should_retry(&self, aborts: u32) -> bool {
        aborts < self.max_aborts
    }
}
