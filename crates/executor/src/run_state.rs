//! Shared run coordination state
//!
//! One [`RunState`] is shared by the coordinator and every worker:
//!
//! - per-worker ready flags, set once setup is done
//! - `begin`, flipped by the coordinator once every worker is ready
//! - `finish`, flipped by the first worker to exhaust its input
//! - `cancelled`, flipped when setup fails so the barrier cannot hang
//! - start and end timestamps, guarded by a mutex
//! - aggregate committed and aborted counters, written at worker exit
//!
//! # Ordering
//!
//! Flags are stored with Release and loaded with Acquire. The end timestamp
//! and the finish flag are written together under the clock mutex, so any
//! worker that observes `finish` also observes a recorded end time.

use crossbeam_utils::{Backoff, CachePadded};
use htmbench_core::ThreadId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Clock {
    start: Option<Instant>,
    end: Option<Instant>,
}

/// Coordination flags, timestamps and totals for one run
#[derive(Debug)]
pub struct RunState {
    ready: Box<[CachePadded<AtomicBool>]>,
    begin: CachePadded<AtomicBool>,
    finish: CachePadded<AtomicBool>,
    cancelled: AtomicBool,
    clock: Mutex<Clock>,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl RunState {
    /// Create the state for `thread_count` workers
    pub fn new(thread_count: usize) -> Self {
        Self {
            ready: (0..thread_count)
                .map(|_| CachePadded::new(AtomicBool::new(false)))
                .collect(),
            begin: CachePadded::new(AtomicBool::new(false)),
            finish: CachePadded::new(AtomicBool::new(false)),
            cancelled: AtomicBool::new(false),
            clock: Mutex::new(Clock::default()),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    /// Number of workers
    pub fn thread_count(&self) -> usize {
        self.ready.len()
    }

    /// Mark a worker as done with setup
    pub fn mark_ready(&self, thread: ThreadId) {
        if let Some(flag) = self.ready.get(thread.get()) {
            flag.store(true, Ordering::Release);
        }
    }

    /// Check whether every worker finished setup
    pub fn all_ready(&self) -> bool {
        self.ready.iter().all(|flag| flag.load(Ordering::Acquire))
    }

    /// Coordinator side of the barrier
    ///
    /// Waits for every ready flag, records the start timestamp and releases
    /// the workers. Returns false without releasing anyone if the run was
    /// cancelled first.
    pub fn open_barrier(&self) -> bool {
        let backoff = Backoff::new();
        while !self.all_ready() {
            if self.is_cancelled() {
                return false;
            }
            backoff.snooze();
        }
        self.clock.lock().start = Some(Instant::now());
        self.begin.store(true, Ordering::Release);
        true
    }

    /// Worker side of the barrier
    ///
    /// Returns true once the run begins, false if it was cancelled.
    pub fn wait_for_begin(&self) -> bool {
        let backoff = Backoff::new();
        loop {
            if self.begin.load(Ordering::Acquire) {
                return true;
            }
            if self.is_cancelled() {
                return false;
            }
            backoff.snooze();
        }
    }

    /// Check whether the timed region has started
    pub fn has_begun(&self) -> bool {
        self.begin.load(Ordering::Acquire)
    }

    /// Abort the run before the timed region
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Check whether some worker already exhausted its input
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finish.load(Ordering::Acquire)
    }

    /// Record the end timestamp and set `finish`, once per run
    ///
    /// Returns true for the single caller that won.
    pub fn try_finish(&self) -> bool {
        let mut clock = self.clock.lock();
        if self.finish.load(Ordering::Acquire) {
            return false;
        }
        clock.end = Some(Instant::now());
        self.finish.store(true, Ordering::Release);
        true
    }

    /// Fold a worker's counters into the run totals
    pub fn add_counts(&self, committed: u64, aborted: u64) {
        self.total_committed.fetch_add(committed, Ordering::AcqRel);
        self.total_aborted.fetch_add(aborted, Ordering::AcqRel);
    }

    /// Committed transactions across all workers
    pub fn total_committed(&self) -> u64 {
        self.total_committed.load(Ordering::Acquire)
    }

    /// Aborted attempts across all workers
    pub fn total_aborted(&self) -> u64 {
        self.total_aborted.load(Ordering::Acquire)
    }

    /// Time from barrier release to finish
    ///
    /// Zero if either timestamp is missing.
    pub fn elapsed(&self) -> Duration {
        let clock = self.clock.lock();
        match (clock.start, clock.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// End timestamp, once recorded
    pub fn end_time(&self) -> Option<Instant> {
        self.clock.lock().end
    }
}
