//! Retry budgets for the speculative path
//!
//! Acquire runs a two-tier loop: an outer budget of transactional attempts
//! (`conflict_retries`) and an inner budget of capacity aborts
//! (`capacity_retries`) that ends the loop early. Whether a capacity abort
//! also spends an outer attempt is [`CapacityCoupling`].

use serde::{Deserialize, Serialize};

/// How capacity aborts interact with the outer attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapacityCoupling {
    /// A capacity abort consumes one outer attempt as well as one capacity retry
    #[default]
    Shared,
    /// Capacity aborts only consume the capacity budget
    Independent,
}

/// Retry limits for one [`HtmLock`](crate::HtmLock)
///
/// Fields missing from a deserialized config take the [`RetryLimits::RTM`]
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryLimits {
    /// Maximum transactional attempts before escalating to the fallback lock
    pub conflict_retries: u32,
    /// Capacity aborts tolerated before escalating
    pub capacity_retries: u32,
    /// Coupling between the two budgets
    pub capacity_coupling: CapacityCoupling,
    /// Escalate immediately when the hardware reports that retrying is futile
    pub honor_retry_hint: bool,
}

impl RetryLimits {
    /// Intel RTM defaults
    pub const RTM: RetryLimits = RetryLimits {
        conflict_retries: 100,
        capacity_retries: 10,
        capacity_coupling: CapacityCoupling::Shared,
        honor_retry_hint: true,
    };

    /// IBM POWER defaults; POWER transactions are expensive to restart
    pub const POWER: RetryLimits = RetryLimits {
        conflict_retries: 5,
        capacity_retries: 2,
        capacity_coupling: CapacityCoupling::Shared,
        honor_retry_hint: false,
    };

    /// Create limits with the given budgets and shared coupling
    pub const fn new(conflict_retries: u32, capacity_retries: u32) -> Self {
        Self {
            conflict_retries,
            capacity_retries,
            capacity_coupling: CapacityCoupling::Shared,
            honor_retry_hint: true,
        }
    }

    /// Limits that never speculate: every acquire goes straight to the fallback lock
    pub const fn fallback_only() -> Self {
        Self::new(0, 0)
    }

    /// Set the capacity coupling
    pub const fn with_coupling(mut self, coupling: CapacityCoupling) -> Self {
        self.capacity_coupling = coupling;
        self
    }

    /// Set whether the hardware retry hint is honored
    pub const fn with_retry_hint(mut self, honor: bool) -> Self {
        self.honor_retry_hint = honor;
        self
    }
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self::RTM
    }
}
