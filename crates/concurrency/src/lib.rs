//! Concurrency layer for htmbench
//!
//! This crate implements a hybrid mutual-exclusion primitive:
//! - [`HtmLock`]: runs the critical section inside a hardware transaction and
//!   escalates to a blocking [`SpinLock`] only when speculation cannot make progress
//! - [`HtmBackend`]: one interface over the hardware instruction sets
//!   ([`Rtm`] on x86_64, [`Power`] on powerpc64) and a software [`Emulated`] backend
//! - [`AbortStatus`] / [`AbortCause`]: hardware abort classification
//! - [`RetryLimits`]: per-cause retry budgets
//! - [`LockStats`]: abort counters, compiled in only with the `htm-profile` feature
//!
//! The backend used by [`HtmLock`] without an explicit type parameter is
//! [`DefaultBackend`], selected at build time from the enabled features.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(
    all(target_arch = "powerpc64", feature = "power-htm"),
    feature(asm_experimental_arch)
)]

pub mod backend;
pub mod limits;
pub mod lock;
pub mod spinlock;
pub mod stats;
pub mod status;

pub use backend::{
    AbortInjection, Begin, DefaultBackend, Emulated, HtmBackend, Power, Rtm, LOCK_HELD_ABORT_CODE,
};
pub use limits::{CapacityCoupling, RetryLimits};
pub use lock::{Acquisition, HtmGuard, HtmLock};
pub use spinlock::SpinLock;
pub use stats::{LockStats, LockStatsSnapshot};
pub use status::{AbortCause, AbortStatus};
