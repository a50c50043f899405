//! Intel Restricted Transactional Memory (RTM)
//!
//! `xbegin` leaves EAX untouched when the transaction starts and jumps to
//! its fallback label with the abort status in EAX otherwise. The status
//! layout:
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 0 | explicit `xabort` |
//! | 1 | retry may succeed |
//! | 2 | memory conflict |
//! | 3 | capacity overflow |
//! | 4 | debug breakpoint |
//! | 5 | abort in nested transaction |
//! | 24..31 | `xabort` immediate |

use super::{Begin, HtmBackend};
use crate::limits::RetryLimits;
use crate::status::AbortStatus;

const XBEGIN_STARTED: u32 = !0;
const XABORT_EXPLICIT: u32 = 1 << 0;
const XABORT_RETRY: u32 = 1 << 1;
const XABORT_CONFLICT: u32 = 1 << 2;
const XABORT_CAPACITY: u32 = 1 << 3;
const XABORT_DEBUG: u32 = 1 << 4;
const XABORT_NESTED: u32 = 1 << 5;

/// Decode an RTM abort status word
pub fn decode_rtm_status(status: u32) -> AbortStatus {
    let mut decoded = if status & XABORT_EXPLICIT != 0 {
        AbortStatus::explicit((status >> 24) as u8)
    } else {
        AbortStatus::other()
    };
    if status & XABORT_CONFLICT != 0 {
        decoded = decoded.with_conflict();
    }
    if status & XABORT_CAPACITY != 0 {
        decoded = decoded.with_capacity();
    }
    if status & XABORT_DEBUG != 0 {
        decoded = decoded.with_debug();
    }
    if status & XABORT_NESTED != 0 {
        decoded = decoded.with_nested();
    }
    decoded.with_retry(status & XABORT_RETRY != 0)
}

/// Intel RTM backend
///
/// Construction probes CPUID. Microcode updates disable TSX on many parts,
/// so a build with the `rtm` feature may still run on a CPU without it; in
/// that case `begin` always reports a non-retryable abort.
#[derive(Debug, Clone, Copy)]
pub struct Rtm {
    supported: bool,
}

impl Rtm {
    /// Probe the running CPU
    pub fn detect() -> Self {
        let supported = hw::available();
        if !supported {
            tracing::warn!("RTM unavailable on this CPU or build; HTM locks will always fall back");
        }
        Self { supported }
    }

    /// Check whether transactions can actually start
    pub fn is_supported(&self) -> bool {
        self.supported
    }
}

impl Default for Rtm {
    fn default() -> Self {
        Self::detect()
    }
}

unsafe impl HtmBackend for Rtm {
    const NAME: &'static str = "rtm";
    const DEFAULT_LIMITS: RetryLimits = RetryLimits::RTM;

    #[inline(always)]
    unsafe fn begin(&self) -> Begin {
        if !self.supported {
            return Begin::Aborted(AbortStatus::other());
        }
        let status = hw::xbegin();
        if status == XBEGIN_STARTED {
            Begin::Started
        } else {
            Begin::Aborted(decode_rtm_status(status))
        }
    }

    #[inline(always)]
    unsafe fn commit(&self) {
        hw::xend();
    }

    #[inline(always)]
    unsafe fn abort(&self) {
        hw::xabort_lock_held();
    }
}

#[cfg(all(target_arch = "x86_64", feature = "rtm"))]
mod hw {
    use super::XBEGIN_STARTED;
    use std::arch::asm;

    pub(super) fn available() -> bool {
        std::arch::is_x86_feature_detected!("rtm")
    }

    #[inline(always)]
    pub(super) unsafe fn xbegin() -> u32 {
        let mut status: u32 = XBEGIN_STARTED;
        // On abort the CPU restores registers, loads EAX and resumes at 2.
        asm!("xbegin 2f", "2:", inout("eax") status, options(nostack, att_syntax));
        status
    }

    #[inline(always)]
    pub(super) unsafe fn xend() {
        asm!("xend", options(nostack, att_syntax));
    }

    #[inline(always)]
    pub(super) unsafe fn xabort_lock_held() {
        // Immediate must match LOCK_HELD_ABORT_CODE.
        asm!("xabort $0xff", options(nostack, att_syntax));
    }
}

#[cfg(not(all(target_arch = "x86_64", feature = "rtm")))]
mod hw {
    pub(super) fn available() -> bool {
        false
    }

    pub(super) unsafe fn xbegin() -> u32 {
        0
    }

    pub(super) unsafe fn xend() {}

    pub(super) unsafe fn xabort_lock_held() {}
}
