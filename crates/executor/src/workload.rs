//! Workload contract
//!
//! A workload supplies everything the harness does not own:
//!
//! | Hook | Called | Purpose |
//! |------|--------|---------|
//! | [`Workload::prepare_procedures`] | once, before any worker starts | register a factory per [`TxnType`] |
//! | [`Workload::deserialize_param`] | per parameter, during worker setup | rebuild a worker-private copy |
//! | [`Workload::create_txn_manager`] | once per worker | build the worker's transaction manager |
//!
//! Stored procedures are instantiated per worker from the registered
//! factories, so a procedure instance is only ever touched by one thread.

use crate::context::ExecutionContext;
use htmbench_concurrency::HtmLock;
use htmbench_core::{CoreId, Error, NodeId, Result, ThreadId, TxnParam, TxnType};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Result of one transaction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    /// The transaction committed
    Committed,
    /// The transaction aborted and may be retried
    Aborted,
}

impl TxnOutcome {
    /// Check whether the attempt committed
    pub fn is_committed(self) -> bool {
        matches!(self, TxnOutcome::Committed)
    }
}

/// Per-worker transaction manager
///
/// Owned by exactly one worker for the whole run.
pub trait TransactionManager {
    /// Release resources held by the manager
    ///
    /// Called exactly once as the worker exits, after its counters have
    /// been folded into the run totals.
    fn cleanup(&mut self) {}
}

/// Executable transaction logic for one [`TxnType`]
pub trait StoredProcedure<W: Workload> {
    /// Run one attempt of the transaction
    ///
    /// `output` is cleared by the harness before every attempt. On
    /// [`TxnOutcome::Aborted`] the harness may call again with the same
    /// parameter and `ctx.is_retry()` set.
    fn execute(
        &mut self,
        txn: &mut W::TxnManager,
        param: &W::Param,
        output: &mut Vec<u8>,
        ctx: &mut ExecutionContext,
    ) -> TxnOutcome;
}

/// Builds a worker's procedure instance for a NUMA node
pub type ProcedureFactory<W> = Box<dyn Fn(NodeId) -> Box<dyn StoredProcedure<W>> + Send + Sync>;

/// Identity of a worker, handed to [`Workload::create_txn_manager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker index
    pub thread_id: ThreadId,
    /// Core the worker is pinned to
    pub core_id: CoreId,
    /// NUMA node of that core
    pub node_id: NodeId,
    /// Number of workers in the run
    pub thread_count: usize,
}

/// A benchmark workload
pub trait Workload: Sync + Sized {
    /// Parameter record type
    type Param: TxnParam;

    /// Per-worker transaction manager type
    type TxnManager: TransactionManager;

    /// Register one procedure factory per transaction type
    fn prepare_procedures(&self, registry: &mut ProcedureRegistry<Self>);

    /// Rebuild a parameter from the bytes produced by
    /// [`TxnParam::serialize_into`]
    fn deserialize_param(&self, txn_type: TxnType, bytes: &[u8]) -> Result<Self::Param>;

    /// Build a worker's transaction manager, bound to the shared lock when
    /// the run has one
    fn create_txn_manager(&self, worker: &WorkerInfo, lock: Option<&Arc<HtmLock>>)
        -> Self::TxnManager;
}

/// Map from transaction type to procedure factory
///
/// Filled by [`Workload::prepare_procedures`] and read-only afterwards.
pub struct ProcedureRegistry<W: Workload> {
    factories: FxHashMap<TxnType, ProcedureFactory<W>>,
}

impl<W: Workload> ProcedureRegistry<W> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Register the factory for `txn_type`, replacing any earlier one
    pub fn register<F>(&mut self, txn_type: TxnType, factory: F)
    where
        F: Fn(NodeId) -> Box<dyn StoredProcedure<W>> + Send + Sync + 'static,
    {
        if self.factories.insert(txn_type, Box::new(factory)).is_some() {
            tracing::warn!(%txn_type, "procedure factory registered twice; keeping the last one");
        }
    }

    /// Check whether `txn_type` has a factory
    pub fn contains(&self, txn_type: TxnType) -> bool {
        self.factories.contains_key(&txn_type)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered types in ascending order
    pub fn txn_types(&self) -> Vec<TxnType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Build one procedure per registered type for a worker on `node`
    pub fn instantiate(&self, node: NodeId) -> ProcedureSet<W> {
        let mut slots = FxHashMap::default();
        let mut procedures = Vec::with_capacity(self.factories.len());
        for txn_type in self.txn_types() {
            if let Some(factory) = self.factories.get(&txn_type) {
                slots.insert(txn_type, ProcedureSlot(procedures.len()));
                procedures.push(factory(node));
            }
        }
        ProcedureSet { slots, procedures }
    }
}

impl<W: Workload> Default for ProcedureRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Workload> std::fmt::Debug for ProcedureRegistry<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureRegistry")
            .field("txn_types", &self.txn_types())
            .finish()
    }
}

/// Position of a procedure inside the [`ProcedureSet`] that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProcedureSlot(usize);

/// A worker's procedure instances, one per registered type
pub struct ProcedureSet<W: Workload> {
    slots: FxHashMap<TxnType, ProcedureSlot>,
    procedures: Vec<Box<dyn StoredProcedure<W>>>,
}

impl<W: Workload> ProcedureSet<W> {
    /// Procedure for `txn_type`
    pub fn get_mut(
        &mut self,
        txn_type: TxnType,
        thread: ThreadId,
    ) -> Result<&mut (dyn StoredProcedure<W> + 'static)> {
        match self.slot(txn_type) {
            Some(slot) => Ok(self.at(slot)),
            None => Err(Error::UnregisteredTxnType { txn_type, thread }),
        }
    }

    /// Resolve `txn_type` once, ahead of the timed loop
    pub(crate) fn slot(&self, txn_type: TxnType) -> Option<ProcedureSlot> {
        self.slots.get(&txn_type).copied()
    }

    /// Procedure behind a slot issued by this set
    #[inline]
    pub(crate) fn at(
        &mut self,
        slot: ProcedureSlot,
    ) -> &mut (dyn StoredProcedure<W> + 'static) {
        self.procedures[slot.0].as_mut()
    }

    /// Number of procedures
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
