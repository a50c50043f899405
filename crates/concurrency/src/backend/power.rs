//! IBM POWER hardware transactional memory
//!
//! Abort information lives in the 64-bit TEXASR register, numbered in IBM
//! big-endian bit order (bit 0 is the most significant):
//!
//! | Bits | Field |
//! |------|-------|
//! | 0..7 | failure code (`tabort.` operand; bit 7 doubles as "failure persistent") |
//! | 9 | nesting overflow |
//! | 10 | footprint overflow |
//! | 11..14 | self-induced, non-transactional, transactional, TLB-invalidation conflicts |
//! | 31 | aborted by `tabort.` |
//!
//! POWER has no debug abort bit.
//!
//! Inline assembly on powerpc64 is still unstable, so the instruction layer
//! needs a nightly toolchain and the `power-htm` feature. The decoder is
//! plain code and builds everywhere.

use super::{Begin, HtmBackend};
use crate::limits::RetryLimits;
use crate::status::AbortStatus;

#[inline]
const fn texasr_bits(texasr: u64, last_bit: u32, size: u32) -> u64 {
    (texasr >> (63 - last_bit)) & ((1u64 << size) - 1)
}

/// Decode a TEXASR value captured after a failed transaction
pub fn decode_texasr(texasr: u64) -> AbortStatus {
    let failure_code = texasr_bits(texasr, 7, 8) as u8;
    let persistent = texasr_bits(texasr, 7, 1) != 0;
    let user_abort = texasr_bits(texasr, 31, 1) != 0;

    let mut status = if user_abort {
        AbortStatus::explicit(failure_code)
    } else {
        AbortStatus::other()
    };
    if texasr_bits(texasr, 9, 1) != 0 {
        status = status.with_nested();
    }
    if texasr_bits(texasr, 10, 1) != 0 {
        status = status.with_capacity();
    }
    if texasr_bits(texasr, 14, 4) != 0 {
        status = status.with_conflict();
    }
    status.with_retry(!persistent)
}

/// IBM POWER HTM backend
///
/// Availability is decided by the build: the backend can only start
/// transactions when compiled for powerpc64 with `power-htm`.
#[derive(Debug, Clone, Copy)]
pub struct Power {
    supported: bool,
}

impl Power {
    /// Create the backend for the current build
    pub fn detect() -> Self {
        let supported = cfg!(all(target_arch = "powerpc64", feature = "power-htm"));
        if !supported {
            tracing::warn!("POWER HTM unavailable in this build; HTM locks will always fall back");
        }
        Self { supported }
    }

    /// Check whether transactions can actually start
    pub fn is_supported(&self) -> bool {
        self.supported
    }
}

impl Default for Power {
    fn default() -> Self {
        Self::detect()
    }
}

unsafe impl HtmBackend for Power {
    const NAME: &'static str = "power";
    const DEFAULT_LIMITS: RetryLimits = RetryLimits::POWER;

    #[inline(always)]
    unsafe fn begin(&self) -> Begin {
        if !self.supported {
            return Begin::Aborted(AbortStatus::other());
        }
        if hw::tbegin() {
            Begin::Started
        } else {
            Begin::Aborted(decode_texasr(hw::texasr()))
        }
    }

    #[inline(always)]
    unsafe fn commit(&self) {
        hw::tend();
    }

    #[inline(always)]
    unsafe fn abort(&self) {
        hw::tabort_lock_held();
    }
}

#[cfg(all(target_arch = "powerpc64", feature = "power-htm"))]
mod hw {
    use std::arch::asm;

    /// Returns true when the transaction started (CR0[EQ] clear)
    #[inline(always)]
    pub(super) unsafe fn tbegin() -> bool {
        let cr: u32;
        asm!("tbegin. 0", "mfcr {cr}", cr = out(reg) cr, options(nostack));
        (cr >> 29) & 1 == 0
    }

    #[inline(always)]
    pub(super) unsafe fn tend() {
        asm!("tend. 0", options(nostack));
    }

    #[inline(always)]
    pub(super) unsafe fn tabort_lock_held() {
        // Code must match LOCK_HELD_ABORT_CODE.
        asm!("li {code}, 0xff", "tabort. {code}", code = out(reg_nonzero) _, options(nostack));
    }

    #[inline(always)]
    pub(super) unsafe fn texasr() -> u64 {
        let value: u64;
        asm!("mfspr {v}, 130", v = out(reg) value, options(nostack, nomem));
        value
    }
}

#[cfg(not(all(target_arch = "powerpc64", feature = "power-htm")))]
mod hw {
    pub(super) unsafe fn tbegin() -> bool {
        false
    }

    pub(super) unsafe fn tend() {}

    pub(super) unsafe fn tabort_lock_held() {}

    pub(super) unsafe fn texasr() -> u64 {
        0
    }
}
