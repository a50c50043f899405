//! Hardware transactional-memory backends
//!
//! [`HtmBackend`] is the single seam between [`HtmLock`](crate::HtmLock) and
//! the instruction set. Backends differ only in how they start, end and
//! abort a transaction and in which abort-cause bits their status register
//! exposes; the acquire/release protocol lives in the lock.
//!
//! | Backend | Target | Feature | Default limits |
//! |---------|--------|---------|----------------|
//! | [`Rtm`] | x86_64 | `rtm` | 100 / 10 |
//! | [`Power`] | powerpc64 | `power-htm` | 5 / 2 |
//! | [`Emulated`] | any | none | 100 / 10 |
//!
//! The hardware backends compile on every target. Without their feature (or
//! on a CPU without transactional memory) `begin` reports a non-retryable
//! abort, so every acquire degrades to the fallback lock.

mod emulated;
mod power;
mod rtm;

pub use emulated::{AbortInjection, Emulated};
pub use power::{decode_texasr, Power};
pub use rtm::{decode_rtm_status, Rtm};

use crate::limits::RetryLimits;
use crate::status::AbortStatus;

/// Abort code used when a speculative context finds the fallback lock held
pub const LOCK_HELD_ABORT_CODE: u8 = 0xff;

/// Outcome of starting a hardware transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// The transaction is open; subsequent memory effects are speculative
    Started,
    /// The transaction aborted (possibly after running for a while)
    Aborted(AbortStatus),
}

/// One hardware transactional-memory instruction set
///
/// # Safety
///
/// Implementors guarantee that between a `begin` returning
/// [`Begin::Started`] and the matching `commit`, the memory effects of the
/// calling context are isolated from every other context, and that any
/// write to memory the transaction has read aborts it before `commit`
/// returns. [`HtmLock`](crate::HtmLock) relies on this to exclude
/// speculative holders once the fallback lock is taken.
pub unsafe trait HtmBackend: Send + Sync {
    /// Short name used in logs and reports
    const NAME: &'static str;

    /// Retry limits tuned for this instruction set
    const DEFAULT_LIMITS: RetryLimits;

    /// Start a transaction
    ///
    /// With hardware backends an abort anywhere inside the transaction
    /// resumes execution here, returning [`Begin::Aborted`] a second time.
    ///
    /// # Safety
    ///
    /// A `Started` result must be closed by exactly one `commit` or `abort`
    /// from the same thread.
    unsafe fn begin(&self) -> Begin;

    /// Commit the open transaction
    ///
    /// # Safety
    ///
    /// Must follow a `Started` begin on the same thread.
    unsafe fn commit(&self);

    /// Abort the open transaction with [`LOCK_HELD_ABORT_CODE`]
    ///
    /// Hardware backends never return from this call: control resumes in
    /// `begin`. Software backends return normally.
    ///
    /// # Safety
    ///
    /// Must follow a `Started` begin on the same thread.
    unsafe fn abort(&self);

    /// Hook run right after the fallback lock is acquired
    ///
    /// Hardware needs nothing here: the lock write already aborted every
    /// speculative reader. Software backends drain in-flight speculation.
    #[inline]
    fn after_fallback_acquired(&self) {}
}

/// Backend selected at build time
#[cfg(all(target_arch = "x86_64", feature = "rtm"))]
pub type DefaultBackend = Rtm;

/// Backend selected at build time
#[cfg(all(target_arch = "powerpc64", feature = "power-htm"))]
pub type DefaultBackend = Power;

/// Backend selected at build time
#[cfg(not(any(
    all(target_arch = "x86_64", feature = "rtm"),
    all(target_arch = "powerpc64", feature = "power-htm")
)))]
pub type DefaultBackend = Emulated;
