//! Parameter batch sources

use htmbench_core::{ParamBatch, ThreadId};
use parking_lot::Mutex;

/// Supplies each worker's input batches
///
/// Called once per worker during setup. Ownership of the batches moves to
/// the worker.
pub trait BatchSource<P>: Sync {
    /// Hand over the batches prepared for `thread`
    fn take_batches(&self, thread: ThreadId) -> Vec<ParamBatch<P>>;
}

/// Batch source backed by pre-built per-worker vectors
#[derive(Debug)]
pub struct InMemoryBatchSource<P> {
    slots: Mutex<Vec<Vec<ParamBatch<P>>>>,
}

impl<P: Send> InMemoryBatchSource<P> {
    /// Create a source with `thread_count` empty slots
    pub fn new(thread_count: usize) -> Self {
        Self {
            slots: Mutex::new((0..thread_count).map(|_| Vec::new()).collect()),
        }
    }

    /// Create a source from already-batched input, one vector per worker
    pub fn from_batches(batches: Vec<Vec<ParamBatch<P>>>) -> Self {
        Self {
            slots: Mutex::new(batches),
        }
    }

    /// Create a source from flat per-worker parameter lists
    pub fn from_params(params: Vec<Vec<P>>, batch_capacity: usize) -> Self {
        Self::from_batches(
            params
                .into_iter()
                .map(|list| ParamBatch::chunk(list, batch_capacity))
                .collect(),
        )
    }

    /// Append a batch for `thread`, growing the slot table if needed
    pub fn push(&self, thread: ThreadId, batch: ParamBatch<P>) {
        let mut slots = self.slots.lock();
        if slots.len() <= thread.get() {
            slots.resize_with(thread.get() + 1, Vec::new);
        }
        slots[thread.get()].push(batch);
    }

    /// Number of worker slots
    pub fn thread_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Parameters still waiting for `thread`
    pub fn pending(&self, thread: ThreadId) -> usize {
        self.slots
            .lock()
            .get(thread.get())
            .map_or(0, |batches| batches.iter().map(ParamBatch::len).sum())
    }
}

impl<P: Send> BatchSource<P> for InMemoryBatchSource<P> {
    fn take_batches(&self, thread: ThreadId) -> Vec<ParamBatch<P>> {
        self.slots
            .lock()
            .get_mut(thread.get())
            .map(std::mem::take)
            .unwrap_or_default()
    }
}
