//! Shared helpers for integration tests.

#![allow(dead_code)]

use htmbench::{Emulated, HtmLock, RetryLimits};
use std::sync::Arc;

/// Install a tracing subscriber that writes through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Emulated lock that never speculates.
pub fn fallback_only_lock() -> Arc<HtmLock<Emulated>> {
    Arc::new(HtmLock::with_limits(RetryLimits::fallback_only()))
}

/// Emulated lock with default limits.
pub fn emulated_lock() -> Arc<HtmLock<Emulated>> {
    Arc::new(HtmLock::new())
}
