//! Harness tests driven by a scripted workload.


use crate::context::ExecutionContext;
use crate::source::InMemoryBatchSource;
use crate::workload::{
    ProcedureRegistry, StoredProcedure, TransactionManager, TxnOutcome, WorkerInfo, Workload,
};
use htmbench_concurrency::HtmLock;
use htmbench_core::{decode_param, encode_param, Result, TxnParam, TxnType};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

pub(crate) const OP: TxnType = TxnType(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Op {
    pub tag: u32,
    pub id: u64,
}

impl Op {
    pub fn new(id: u64) -> Self {
        Self { tag: OP.get(), id }
    }
}

impl TxnParam for Op {
    fn txn_type(&self) -> TxnType {
        TxnType(self.tag)
    }

    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_param(self, out)
    }
}

/// What each procedure attempt does
#[derive(Clone)]
pub(crate) enum Behavior {
    Commit,
    /// Abort every first attempt. Workers meet at `rendezvous` on the retry
    /// of parameter `last_id`, so none can finish before all got there.
    FailOnce {
        rendezvous: Option<Arc<Barrier>>,
        last_id: u64,
    },
    AlwaysAbort,
}

pub(crate) struct ScriptTxn {
    cleanups: Arc<AtomicUsize>,
    bound_to_lock: bool,
}

impl TransactionManager for ScriptTxn {
    fn cleanup(&mut self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct Scripted {
    pub behavior: Behavior,
    pub deserialized: AtomicUsize,
    pub cleanups: Arc<AtomicUsize>,
    pub bound_managers: AtomicUsize,
    pub panic_in_setup: bool,
}

impl Scripted {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            deserialized: AtomicUsize::new(0),
            cleanups: Arc::new(AtomicUsize::new(0)),
            bound_managers: AtomicUsize::new(0),
            panic_in_setup: false,
        }
    }
}

impl Workload for &Scripted {
    type Param = Op;
    type TxnManager = ScriptTxn;

    fn prepare_procedures(&self, registry: &mut ProcedureRegistry<Self>) {
        let behavior = self.behavior.clone();
        registry.register(OP, move |_node| {
            Box::new(ScriptProc {
                behavior: behavior.clone(),
            })
        });
    }

    fn deserialize_param(&self, _txn_type: TxnType, bytes: &[u8]) -> Result<Op> {
        self.deserialized.fetch_add(1, Ordering::SeqCst);
        decode_param(bytes)
    }

    fn create_txn_manager(&self, _worker: &WorkerInfo, lock: Option<&Arc<HtmLock>>) -> ScriptTxn {
        if self.panic_in_setup {
            panic!("transaction manager construction failed");
        }
        if lock.is_some() {
            self.bound_managers.fetch_add(1, Ordering::SeqCst);
        }
        ScriptTxn {
            cleanups: Arc::clone(&self.cleanups),
            bound_to_lock: lock.is_some(),
        }
    }
}

pub(crate) struct ScriptProc {
    behavior: Behavior,
}

impl<'a> StoredProcedure<&'a Scripted> for ScriptProc {
    fn execute(
        &mut self,
        txn: &mut ScriptTxn,
        param: &Op,
        output: &mut Vec<u8>,
        ctx: &mut ExecutionContext,
    ) -> TxnOutcome {
        assert!(output.is_empty(), "output buffer not reset between attempts");
        output.extend_from_slice(&param.id.to_le_bytes());
        output.push(txn.bound_to_lock as u8);
        match &self.behavior {
            Behavior::Commit => TxnOutcome::Committed,
            Behavior::AlwaysAbort => TxnOutcome::Aborted,
            Behavior::FailOnce {
                rendezvous,
                last_id,
            } => {
                if !ctx.is_retry() {
                    return TxnOutcome::Aborted;
                }
                assert_eq!(ctx.attempt(), 1);
                if param.id == *last_id {
                    if let Some(barrier) = rendezvous {
                        barrier.wait();
                    }
                }
                TxnOutcome::Committed
            }
        }
    }
}

/// `threads` workers with `per_thread` parameters each, ids `0..per_thread`
pub(crate) fn source(threads: usize, per_thread: u64) -> InMemoryBatchSource<Op> {
    let params = (0..threads)
        .map(|_| (0..per_thread).map(Op::new).collect())
        .collect();
    InMemoryBatchSource::from_params(params, 4)
}
