//! Lock profiling counters
//!
//! Counting happens on the acquire path, so it is a build-time choice: with
//! the `htm-profile` feature [`LockStats`] holds relaxed atomic counters,
//! without it the type is empty and every recorder compiles to nothing.

use crate::status::AbortCause;
use serde::Serialize;
#[cfg(feature = "htm-profile")]
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "htm-profile")]
#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    fallback: AtomicU64,
    retry_hint: AtomicU64,
    aborts: [AtomicU64; AbortCause::ALL.len()],
}

/// Per-lock abort statistics
#[derive(Debug, Default)]
pub struct LockStats {
    #[cfg(feature = "htm-profile")]
    counters: Counters,
}

impl LockStats {
    /// Whether counters are compiled in
    pub const ENABLED: bool = cfg!(feature = "htm-profile");

    #[inline(always)]
    pub(crate) fn record_attempt(&self) {
        #[cfg(feature = "htm-profile")]
        self.counters.total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn record_fallback(&self) {
        #[cfg(feature = "htm-profile")]
        self.counters.fallback.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn record_retry_hint(&self) {
        #[cfg(feature = "htm-profile")]
        self.counters.retry_hint.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn record_abort(&self, cause: AbortCause) {
        #[cfg(feature = "htm-profile")]
        self.counters.aborts[cause.index()].fetch_add(1, Ordering::Relaxed);
        #[cfg(not(feature = "htm-profile"))]
        let _ = cause;
    }

    /// Copy the counters, or `None` when profiling is compiled out
    pub fn snapshot(&self) -> Option<LockStatsSnapshot> {
        #[cfg(feature = "htm-profile")]
        {
            let mut aborts = [0u64; AbortCause::ALL.len()];
            for (slot, counter) in aborts.iter_mut().zip(self.counters.aborts.iter()) {
                *slot = counter.load(Ordering::Relaxed);
            }
            Some(LockStatsSnapshot {
                total: self.counters.total.load(Ordering::Relaxed),
                fallback: self.counters.fallback.load(Ordering::Relaxed),
                retry_hint: self.counters.retry_hint.load(Ordering::Relaxed),
                aborts,
            })
        }
        #[cfg(not(feature = "htm-profile"))]
        {
            None
        }
    }
}

/// Point-in-time copy of [`LockStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LockStatsSnapshot {
    /// Acquire calls
    pub total: u64,
    /// Acquires that escalated to the fallback lock
    pub fallback: u64,
    /// Escalations taken because the hardware reported a retry as futile
    pub retry_hint: u64,
    /// Abort count per cause, indexed by [`AbortCause::index`]
    pub aborts: [u64; AbortCause::ALL.len()],
}

impl LockStatsSnapshot {
    /// Aborts classified as `cause`
    pub fn aborts(&self, cause: AbortCause) -> u64 {
        self.aborts[cause.index()]
    }

    /// Aborts of every cause
    pub fn total_aborts(&self) -> u64 {
        self.aborts.iter().sum()
    }

    /// Acquires that committed speculatively
    pub fn speculative(&self) -> u64 {
        self.total.saturating_sub(self.fallback)
    }

    /// `count / total`, or zero before the first acquire
    pub fn rate(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }

    /// Share of acquires that escalated
    pub fn fallback_rate(&self) -> f64 {
        self.rate(self.fallback)
    }
}

impl std::fmt::Display for LockStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lock count={}, speculative count={}, fallback count={}",
            self.total,
            self.speculative(),
            self.fallback
        )?;
        for cause in AbortCause::ALL {
            write!(f, ", {}_count={}", cause, self.aborts(cause))?;
        }
        write!(f, ", retry_count={}", self.retry_hint)?;
        write!(f, "\nfallback rate={:.6}", self.fallback_rate())?;
        for cause in AbortCause::ALL {
            write!(f, ", {} rate={:.6}", cause, self.rate(self.aborts(cause)))?;
        }
        write!(f, ", retry rate={:.6}", self.rate(self.retry_hint))?;
        Ok(())
    }
}
