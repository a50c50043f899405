//! Per-worker execution context

use htmbench_core::{NodeId, ThreadId};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// State a worker passes to every procedure attempt
#[derive(Debug)]
pub struct ExecutionContext {
    thread_id: ThreadId,
    node_id: NodeId,
    is_retry: bool,
    attempt: u32,
    rng: SmallRng,
}

impl ExecutionContext {
    /// Create the context for a worker
    ///
    /// Every worker draws from its own generator; worker `i` is seeded with
    /// `seed` mixed with `i`, so runs with the same seed are reproducible.
    pub fn new(thread_id: ThreadId, node_id: NodeId, seed: u64) -> Self {
        let mixed = seed ^ (thread_id.get() as u64).wrapping_mul(SEED_MIX);
        Self {
            thread_id,
            node_id,
            is_retry: false,
            attempt: 0,
            rng: SmallRng::seed_from_u64(mixed),
        }
    }

    /// Worker index
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// NUMA node of the worker's core
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Whether the current attempt re-executes an aborted parameter
    pub fn is_retry(&self) -> bool {
        self.is_retry
    }

    /// Zero-based attempt number for the current parameter
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Worker-private random generator
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub(crate) fn begin_param(&mut self) {
        self.is_retry = false;
        self.attempt = 0;
    }

    pub(crate) fn mark_retry(&mut self) {
        self.is_retry = true;
        self.attempt = self.attempt.saturating_add(1);
    }
}
