//! Micro workload: a shared slot table guarded by one HTM lock
//!
//! Two transaction types run against a table of signed counters:
//!
//! | Type | Parameter | Effect |
//! |------|-----------|--------|
//! | `txn-0` | [`MicroParam::Increment`] | `slot += delta` |
//! | `txn-1` | [`MicroParam::Transfer`] | `from -= amount; to += amount` |
//!
//! Every update happens between acquire and release of the shared
//! [`HtmLock`], with plain loads and stores on the slots: the lock alone
//! keeps updates from being lost. Transfers preserve the table sum, which
//! makes lost updates easy to detect.
//!
//! [`MicroConfig::abort_every`] makes every n-th first attempt of a worker
//! abort, so runs exercise the retry path without real contention.

use htmbench_concurrency::HtmLock;
use htmbench_core::{decode_param, encode_param, Error, Result, ThreadId, TxnParam, TxnType};
use htmbench_executor::{
    ExecutionContext, InMemoryBatchSource, ProcedureRegistry, StoredProcedure,
    TransactionManager, TxnOutcome, WorkerInfo, Workload,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Micro workload settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroConfig {
    /// Number of slots in the table
    pub slots: usize,
    /// Starting value of every slot
    pub initial_value: i64,
    /// Abort every n-th first attempt per worker; zero disables injection
    pub abort_every: u64,
}

impl Default for MicroConfig {
    fn default() -> Self {
        Self {
            slots: 64,
            initial_value: 0,
            abort_every: 0,
        }
    }
}

/// Parameter record of the micro workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroParam {
    /// Add `delta` to one slot
    Increment {
        /// Target slot
        slot: usize,
        /// Amount added
        delta: i64,
    },
    /// Move `amount` between two slots
    Transfer {
        /// Debited slot
        from: usize,
        /// Credited slot
        to: usize,
        /// Amount moved
        amount: i64,
    },
}

impl MicroParam {
    /// Tag of [`MicroParam::Increment`]
    pub const INCREMENT: TxnType = TxnType(0);
    /// Tag of [`MicroParam::Transfer`]
    pub const TRANSFER: TxnType = TxnType(1);

    fn max_slot(&self) -> usize {
        match *self {
            MicroParam::Increment { slot, .. } => slot,
            MicroParam::Transfer { from, to, .. } => from.max(to),
        }
    }
}

impl TxnParam for MicroParam {
    fn txn_type(&self) -> TxnType {
        match self {
            MicroParam::Increment { .. } => Self::INCREMENT,
            MicroParam::Transfer { .. } => Self::TRANSFER,
        }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_param(self, out)
    }
}

/// Table of counters shared by every worker
#[derive(Debug)]
pub struct SlotTable {
    slots: Box<[AtomicI64]>,
}

impl SlotTable {
    fn new(len: usize, initial: i64) -> Self {
        Self {
            slots: (0..len).map(|_| AtomicI64::new(initial)).collect(),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current value of `slot`
    pub fn get(&self, slot: usize) -> Option<i64> {
        self.slots.get(slot).map(|value| value.load(Ordering::Acquire))
    }

    /// Sum over all slots
    pub fn sum(&self) -> i64 {
        self.slots
            .iter()
            .map(|value| value.load(Ordering::Acquire))
            .sum()
    }

    // Caller holds the lock.
    fn add(&self, slot: usize, delta: i64) -> i64 {
        let cell = &self.slots[slot];
        let updated = cell.load(Ordering::Relaxed).wrapping_add(delta);
        cell.store(updated, Ordering::Relaxed);
        updated
    }
}

/// The micro workload
#[derive(Debug)]
pub struct MicroWorkload {
    config: MicroConfig,
    table: Arc<SlotTable>,
    lock: Arc<HtmLock>,
}

impl MicroWorkload {
    /// Create the workload with its own lock
    pub fn new(config: MicroConfig) -> Self {
        Self::with_lock(config, Arc::new(HtmLock::new()))
    }

    /// Create the workload around an existing lock
    pub fn with_lock(config: MicroConfig, lock: Arc<HtmLock>) -> Self {
        let table = Arc::new(SlotTable::new(config.slots, config.initial_value));
        Self {
            config,
            table,
            lock,
        }
    }

    /// Settings in force
    pub fn config(&self) -> &MicroConfig {
        &self.config
    }

    /// Shared slot table
    pub fn table(&self) -> &Arc<SlotTable> {
        &self.table
    }

    /// Lock guarding the table
    pub fn lock(&self) -> &Arc<HtmLock> {
        &self.lock
    }

    /// Generate `per_thread` random parameters for each of `threads` workers
    ///
    /// Roughly half of the parameters are transfers. The same seed always
    /// yields the same input.
    pub fn generate(
        &self,
        threads: usize,
        per_thread: usize,
        batch_capacity: usize,
        seed: u64,
    ) -> InMemoryBatchSource<MicroParam> {
        let slots = self.config.slots.max(1);
        let params = (0..threads)
            .map(|thread| {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(thread as u64));
                (0..per_thread)
                    .map(|_| {
                        if rng.gen_bool(0.5) {
                            MicroParam::Increment {
                                slot: rng.gen_range(0..slots),
                                delta: rng.gen_range(1..=10),
                            }
                        } else {
                            MicroParam::Transfer {
                                from: rng.gen_range(0..slots),
                                to: rng.gen_range(0..slots),
                                amount: rng.gen_range(1..=10),
                            }
                        }
                    })
                    .collect()
            })
            .collect();
        InMemoryBatchSource::from_params(params, batch_capacity)
    }
}

/// Per-worker transaction manager of the micro workload
#[derive(Debug)]
pub struct MicroTxn {
    thread: ThreadId,
    table: Arc<SlotTable>,
    lock: Arc<HtmLock>,
    abort_every: u64,
    first_attempts: u64,
}

impl MicroTxn {
    fn inject_abort(&mut self, ctx: &ExecutionContext) -> bool {
        if self.abort_every == 0 || ctx.is_retry() {
            return false;
        }
        self.first_attempts += 1;
        self.first_attempts % self.abort_every == 0
    }

    fn locked<T>(&self, f: impl FnOnce(&SlotTable) -> T) -> T {
        let _guard = self.lock.lock();
        f(&self.table)
    }
}

impl TransactionManager for MicroTxn {
    fn cleanup(&mut self) {
        tracing::trace!(
            thread = %self.thread,
            first_attempts = self.first_attempts,
            "micro txn manager released"
        );
    }
}

struct IncrementProcedure;

impl StoredProcedure<MicroWorkload> for IncrementProcedure {
    fn execute(
        &mut self,
        txn: &mut MicroTxn,
        param: &MicroParam,
        output: &mut Vec<u8>,
        ctx: &mut ExecutionContext,
    ) -> TxnOutcome {
        if txn.inject_abort(ctx) {
            return TxnOutcome::Aborted;
        }
        let MicroParam::Increment { slot, delta } = *param else {
            return TxnOutcome::Aborted;
        };
        let updated = txn.locked(|table| table.add(slot, delta));
        output.extend_from_slice(&updated.to_le_bytes());
        TxnOutcome::Committed
    }
}

struct TransferProcedure;

impl StoredProcedure<MicroWorkload> for TransferProcedure {
    fn execute(
        &mut self,
        txn: &mut MicroTxn,
        param: &MicroParam,
        output: &mut Vec<u8>,
        ctx: &mut ExecutionContext,
    ) -> TxnOutcome {
        if txn.inject_abort(ctx) {
            return TxnOutcome::Aborted;
        }
        let MicroParam::Transfer { from, to, amount } = *param else {
            return TxnOutcome::Aborted;
        };
        let (debited, credited) = txn.locked(|table| {
            let debited = table.add(from, amount.wrapping_neg());
            let credited = table.add(to, amount);
            (debited, credited)
        });
        output.extend_from_slice(&debited.to_le_bytes());
        output.extend_from_slice(&credited.to_le_bytes());
        TxnOutcome::Committed
    }
}

impl Workload for MicroWorkload {
    type Param = MicroParam;
    type TxnManager = MicroTxn;

    fn prepare_procedures(&self, registry: &mut ProcedureRegistry<Self>) {
        registry.register(MicroParam::INCREMENT, |_node| Box::new(IncrementProcedure));
        registry.register(MicroParam::TRANSFER, |_node| Box::new(TransferProcedure));
    }

    fn deserialize_param(&self, _txn_type: TxnType, bytes: &[u8]) -> Result<MicroParam> {
        let param: MicroParam = decode_param(bytes)?;
        if param.max_slot() >= self.table.len() {
            return Err(Error::InvalidConfig(format!(
                "slot {} out of range for {} slots",
                param.max_slot(),
                self.table.len()
            )));
        }
        Ok(param)
    }

    fn create_txn_manager(&self, worker: &WorkerInfo, lock: Option<&Arc<HtmLock>>) -> MicroTxn {
        MicroTxn {
            thread: worker.thread_id,
            table: Arc::clone(&self.table),
            lock: Arc::clone(lock.unwrap_or(&self.lock)),
            abort_every: self.config.abort_every,
            first_attempts: 0,
        }
    }
}
