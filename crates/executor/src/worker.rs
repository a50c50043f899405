//! Worker thread routine
//!
//! Each worker goes through three phases:
//!
//! 1. **Setup**: pin, take its batches, rebuild every parameter through the
//!    workload's deserialize hook, build its transaction manager and
//!    procedures. Any failure here cancels the run.
//! 2. **Barrier**: publish readiness and wait for the coordinator.
//! 3. **Steady state**: execute parameters in order, retrying aborts, until
//!    the input runs out or another worker finishes first.
//!
//! Counters stay local until the worker exits.

use crate::affinity::AffinityResolver;
use crate::context::ExecutionContext;
use crate::retry::RetryPolicy;
use crate::run_state::RunState;
use crate::source::BatchSource;
use crate::workload::{
    ProcedureRegistry, ProcedureSet, ProcedureSlot, TransactionManager, TxnOutcome, WorkerInfo,
    Workload,
};
use htmbench_concurrency::HtmLock;
use htmbench_core::{Error, ParamBatch, Result, ThreadId, TxnParam};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a worker borrows from the coordinator
pub(crate) struct Shared<'a, W: Workload> {
    pub workload: &'a W,
    pub registry: &'a ProcedureRegistry<W>,
    pub source: &'a dyn BatchSource<W::Param>,
    pub affinity: &'a dyn AffinityResolver,
    pub retry: &'a dyn RetryPolicy,
    pub lock: Option<&'a Arc<HtmLock>>,
    pub state: &'a RunState,
    pub span: &'a tracing::Span,
    pub seed: u64,
    pub output_capacity: usize,
}

/// Local counters a worker folds into the run totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkerCounts {
    pub committed: u64,
    pub aborted: u64,
    pub abandoned: u64,
}

/// A worker-private parameter with its procedure already resolved
type Bound<P> = (ProcedureSlot, P);

struct Prepared<W: Workload> {
    info: WorkerInfo,
    batches: Vec<ParamBatch<Bound<W::Param>>>,
    txn: W::TxnManager,
    procedures: ProcedureSet<W>,
}

/// Cancels the run if the worker leaves setup for any reason other than
/// reaching the barrier, including a panic.
struct CancelOnExit<'a> {
    state: &'a RunState,
    armed: bool,
}

impl Drop for CancelOnExit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.cancel();
        }
    }
}

/// Run one worker to completion
pub(crate) fn run<W: Workload>(
    shared: &Shared<'_, W>,
    thread_id: ThreadId,
) -> Result<WorkerCounts> {
    let span = tracing::info_span!(parent: shared.span, "worker", thread = %thread_id);
    let _enter = span.enter();

    let mut guard = CancelOnExit {
        state: shared.state,
        armed: true,
    };
    let mut prepared = prepare(shared, thread_id)?;
    let mut ctx = ExecutionContext::new(thread_id, prepared.info.node_id, shared.seed);

    shared.state.mark_ready(thread_id);
    guard.armed = false;

    if !shared.state.wait_for_begin() {
        warn!("run cancelled before start; worker exiting");
        prepared.txn.cleanup();
        return Err(Error::Cancelled(format!("{} released without start", thread_id)));
    }

    let (counts, exhausted) = execute(shared, &mut prepared, &mut ctx);
    if exhausted && shared.state.try_finish() {
        debug!("first worker to exhaust its input; finish set");
    }
    shared.state.add_counts(counts.committed, counts.aborted);
    prepared.txn.cleanup();
    debug!(
        committed = counts.committed,
        aborted = counts.aborted,
        abandoned = counts.abandoned,
        "worker done"
    );
    Ok(counts)
}

fn prepare<W: Workload>(shared: &Shared<'_, W>, thread_id: ThreadId) -> Result<Prepared<W>> {
    let core_id = shared.affinity.core_for_thread(thread_id);
    if let Err(err) = shared.affinity.pin(core_id) {
        warn!(core = %core_id, error = %err, "failed to pin worker; running unpinned");
    }
    let node_id = shared.affinity.numa_node(core_id);
    let procedures = shared.registry.instantiate(node_id);

    let input = shared.source.take_batches(thread_id);
    let mut batches = Vec::with_capacity(input.len());
    let mut scratch = Vec::new();
    let mut params = 0usize;
    for batch in input {
        let capacity = batch.capacity();
        let copies = batch
            .into_iter()
            .map(|param| copy_param(shared, &procedures, thread_id, param, &mut scratch))
            .collect::<Result<Vec<_>>>()?;
        params += copies.len();
        batches.extend(ParamBatch::chunk(copies, capacity));
    }

    let info = WorkerInfo {
        thread_id,
        core_id,
        node_id,
        thread_count: shared.state.thread_count(),
    };
    let txn = shared.workload.create_txn_manager(&info, shared.lock);
    debug!(
        core = %core_id,
        node = %node_id,
        batches = batches.len(),
        params,
        "worker ready"
    );

    Ok(Prepared {
        info,
        batches,
        txn,
        procedures,
    })
}

/// Rebuild `param` as a worker-private copy bound to its procedure, and
/// drop the original
fn copy_param<W: Workload>(
    shared: &Shared<'_, W>,
    procedures: &ProcedureSet<W>,
    thread_id: ThreadId,
    param: W::Param,
    scratch: &mut Vec<u8>,
) -> Result<Bound<W::Param>> {
    let txn_type = param.txn_type();
    let slot = procedures
        .slot(txn_type)
        .ok_or(Error::UnregisteredTxnType {
            txn_type,
            thread: thread_id,
        })?;
    scratch.clear();
    param.serialize_into(scratch)?;
    drop(param);

    let copy = shared.workload.deserialize_param(txn_type, scratch)?;
    if copy.txn_type() != txn_type {
        return Err(Error::Serialization(format!(
            "deserialized parameter changed type from {} to {}",
            txn_type,
            copy.txn_type()
        )));
    }
    Ok((slot, copy))
}

/// Steady-state loop; returns the counters and whether the input ran out
fn execute<W: Workload>(
    shared: &Shared<'_, W>,
    prepared: &mut Prepared<W>,
    ctx: &mut ExecutionContext,
) -> (WorkerCounts, bool) {
    let state = shared.state;
    let mut counts = WorkerCounts::default();
    let mut output = Vec::with_capacity(shared.output_capacity);

    for batch in &prepared.batches {
        for (slot, param) in batch {
            let procedure = prepared.procedures.at(*slot);

            ctx.begin_param();
            let mut param_aborts = 0u32;
            loop {
                output.clear();
                match procedure.execute(&mut prepared.txn, param, &mut output, ctx) {
                    TxnOutcome::Committed => {
                        counts.committed += 1;
                        break;
                    }
                    TxnOutcome::Aborted => {
                        counts.aborted += 1;
                        param_aborts += 1;
                        if state.is_finished() {
                            return (counts, false);
                        }
                        if !shared.retry.should_retry(param_aborts) {
                            counts.abandoned += 1;
                            break;
                        }
                        ctx.mark_retry();
                    }
                }
            }

            if state.is_finished() {
                return (counts, false);
            }
        }
        if state.is_finished() {
            return (counts, false);
        }
    }
    (counts, true)
}
