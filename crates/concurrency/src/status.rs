//! Hardware abort classification
//!
//! Each backend decodes its own status register into an [`AbortStatus`]:
//! a set of cause flags plus the explicit abort code and the hardware's
//! "retrying may succeed" hint. [`AbortStatus::cause`] reduces the flags to
//! the single [`AbortCause`] the lock acts on.
//!
//! Priority when several flags are set:
//!
//! | Order | Cause | Condition |
//! |-------|-------|-----------|
//! | 1 | Explicit | explicit flag, not from a nested transaction |
//! | 2 | Capacity | footprint overflow |
//! | 3 | Conflict | memory conflict with another context |
//! | 4 | Nested | abort inside a nested transaction |
//! | 5 | Debug | debug trap |
//! | 6 | Other | none of the above |

use serde::{Deserialize, Serialize};

/// Classified reason a hardware transaction aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortCause {
    /// Cross-context memory interference
    Conflict,
    /// Speculative footprint exceeded hardware tracking limits
    Capacity,
    /// Aborted by an explicit abort instruction
    Explicit,
    /// Aborted inside a nested transaction
    Nested,
    /// Debug trap or breakpoint
    Debug,
    /// Interrupts, unsupported instructions, missing hardware support
    Other,
}

impl AbortCause {
    /// All causes in reporting order
    pub const ALL: [AbortCause; 6] = [
        AbortCause::Conflict,
        AbortCause::Capacity,
        AbortCause::Explicit,
        AbortCause::Nested,
        AbortCause::Debug,
        AbortCause::Other,
    ];

    /// Short lowercase name used in reports
    pub const fn name(self) -> &'static str {
        match self {
            AbortCause::Conflict => "conflict",
            AbortCause::Capacity => "capacity",
            AbortCause::Explicit => "explicit",
            AbortCause::Nested => "nested",
            AbortCause::Debug => "debug",
            AbortCause::Other => "other",
        }
    }

    /// Dense index into per-cause counter arrays
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for AbortCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded status of an aborted hardware transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbortStatus {
    explicit: bool,
    code: u8,
    retry: bool,
    conflict: bool,
    capacity: bool,
    nested: bool,
    debug: bool,
}

impl AbortStatus {
    /// Explicit abort carrying `code`
    pub const fn explicit(code: u8) -> Self {
        Self {
            explicit: true,
            code,
            retry: false,
            conflict: false,
            capacity: false,
            nested: false,
            debug: false,
        }
    }

    /// Conflict abort; hardware normally marks these as worth retrying
    pub const fn conflict() -> Self {
        Self {
            conflict: true,
            retry: true,
            ..Self::other()
        }
    }

    /// Capacity (footprint overflow) abort
    pub const fn capacity() -> Self {
        Self {
            capacity: true,
            ..Self::other()
        }
    }

    /// Abort from inside a nested transaction
    pub const fn nested() -> Self {
        Self {
            nested: true,
            ..Self::other()
        }
    }

    /// Debug-trap abort
    pub const fn debug() -> Self {
        Self {
            debug: true,
            ..Self::other()
        }
    }

    /// Abort with no cause flag and no retry hint
    pub const fn other() -> Self {
        Self {
            explicit: false,
            code: 0,
            retry: false,
            conflict: false,
            capacity: false,
            nested: false,
            debug: false,
        }
    }

    /// Set the retry hint
    pub const fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    /// Mark as raised inside a nested transaction
    pub const fn with_nested(mut self) -> Self {
        self.nested = true;
        self
    }

    /// Mark as also carrying a conflict
    pub const fn with_conflict(mut self) -> Self {
        self.conflict = true;
        self
    }

    /// Mark as also carrying a footprint overflow
    pub const fn with_capacity(mut self) -> Self {
        self.capacity = true;
        self
    }

    /// Mark as also carrying a debug trap
    pub const fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Explicit abort code, if the abort was explicit
    #[inline]
    pub const fn code(&self) -> Option<u8> {
        if self.explicit {
            Some(self.code)
        } else {
            None
        }
    }

    /// Hardware hint that retrying may succeed
    #[inline]
    pub const fn may_retry(&self) -> bool {
        self.retry
    }

    /// Explicit flag
    #[inline]
    pub const fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Conflict flag
    #[inline]
    pub const fn is_conflict(&self) -> bool {
        self.conflict
    }

    /// Footprint-overflow flag
    #[inline]
    pub const fn is_capacity(&self) -> bool {
        self.capacity
    }

    /// Nested-transaction flag
    #[inline]
    pub const fn is_nested(&self) -> bool {
        self.nested
    }

    /// Debug flag
    #[inline]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Reduce the flags to one cause
    #[inline]
    pub const fn cause(&self) -> AbortCause {
        if self.explicit && !self.nested {
            AbortCause::Explicit
        } else if self.capacity {
            AbortCause::Capacity
        } else if self.conflict {
            AbortCause::Conflict
        } else if self.nested {
            AbortCause::Nested
        } else if self.debug {
            AbortCause::Debug
        } else {
            AbortCause::Other
        }
    }
}
