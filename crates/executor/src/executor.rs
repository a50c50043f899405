//! DistExecutor: the benchmark run coordinator
//!
//! ```text
//! build() ─► start()
//!              ├─ prepare_procedures
//!              ├─ spawn htm-worker-{i}   (setup, mark ready)
//!              ├─ open barrier           (record start, flip begin)
//!              ├─ join                   (first exhausted worker records end)
//!              └─ RunReport
//! ```

use crate::affinity::{AffinityResolver, NoPinning};
use crate::report::RunReport;
use crate::retry::{RetryPolicy, RetryUntilCommitted};
use crate::run_state::RunState;
use crate::source::BatchSource;
use crate::worker::{self, Shared};
use crate::workload::{ProcedureRegistry, Workload};
use chrono::Utc;
use htmbench_concurrency::HtmLock;
use htmbench_core::{Error, Result, RunId, ThreadId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Default seed for per-worker random generators
pub const DEFAULT_SEED: u64 = 9_084_398_309_893;

/// Default capacity of each worker's output buffer, in bytes
pub const DEFAULT_OUTPUT_CAPACITY: usize = 1024;

/// Plain-data executor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads
    pub threads: usize,
    /// Seed mixed into every worker's random generator
    pub seed: u64,
    /// Initial capacity of each worker's output buffer
    pub output_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            seed: DEFAULT_SEED,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

impl ExecutorConfig {
    /// Check the settings
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when `threads` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::InvalidConfig("threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for [`DistExecutor`]
///
/// # Example
///
/// ```ignore
/// let report = DistExecutor::builder(workload)
///     .threads(4)
///     .htm_lock(Arc::new(HtmLock::new()))
///     .batch_source(source)
///     .build()?
///     .start()?;
/// ```
pub struct DistExecutorBuilder<W: Workload> {
    workload: W,
    config: ExecutorConfig,
    source: Option<Box<dyn BatchSource<W::Param>>>,
    affinity: Box<dyn AffinityResolver>,
    retry: Box<dyn RetryPolicy>,
    lock: Option<Arc<HtmLock>>,
}

impl<W: Workload> DistExecutorBuilder<W> {
    fn new(workload: W) -> Self {
        Self {
            workload,
            config: ExecutorConfig::default(),
            source: None,
            affinity: Box::new(NoPinning),
            retry: Box::new(RetryUntilCommitted),
            lock: None,
        }
    }

    /// Replace all plain settings at once
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of worker threads
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Seed for per-worker random generators
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Initial capacity of each worker's output buffer
    pub fn output_capacity(mut self, bytes: usize) -> Self {
        self.config.output_capacity = bytes;
        self
    }

    /// Share one HTM lock with every worker's transaction manager
    pub fn htm_lock(mut self, lock: Arc<HtmLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Thread placement policy (default [`NoPinning`])
    pub fn affinity(mut self, resolver: impl AffinityResolver + 'static) -> Self {
        self.affinity = Box::new(resolver);
        self
    }

    /// Retry policy for aborted transactions (default [`RetryUntilCommitted`])
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(policy);
        self
    }

    /// Source of every worker's input batches
    pub fn batch_source(mut self, source: impl BatchSource<W::Param> + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Validate the settings and build the executor
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for zero threads or a missing batch source
    /// - [`Error::InvalidAffinity`] when the placement policy cannot place
    ///   every worker
    pub fn build(self) -> Result<DistExecutor<W>> {
        self.config.validate()?;
        let source = self
            .source
            .ok_or_else(|| Error::InvalidConfig("no batch source configured".into()))?;
        self.affinity.validate(self.config.threads)?;

        Ok(DistExecutor {
            workload: self.workload,
            config: self.config,
            source,
            affinity: self.affinity,
            retry: self.retry,
            lock: self.lock,
        })
    }
}

/// Multi-threaded transaction benchmark run
///
/// A run is single-use: [`DistExecutor::start`] consumes the executor.
pub struct DistExecutor<W: Workload> {
    workload: W,
    config: ExecutorConfig,
    source: Box<dyn BatchSource<W::Param>>,
    affinity: Box<dyn AffinityResolver>,
    retry: Box<dyn RetryPolicy>,
    lock: Option<Arc<HtmLock>>,
}

impl<W: Workload> DistExecutor<W> {
    /// Start building an executor for `workload`
    pub fn builder(workload: W) -> DistExecutorBuilder<W> {
        DistExecutorBuilder::new(workload)
    }

    /// Settings in force
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Shared lock, if configured
    pub fn htm_lock(&self) -> Option<&Arc<HtmLock>> {
        self.lock.as_ref()
    }

    /// Execute the run and return its report
    ///
    /// The report is also printed to stdout.
    ///
    /// # Errors
    ///
    /// - setup errors raised by any worker ([`Error::UnregisteredTxnType`],
    ///   [`Error::Serialization`]); the run is cancelled before it begins
    /// - [`Error::WorkerPanicked`] if a worker panicked
    /// - [`Error::InvalidConfig`] if a worker thread could not be spawned
    pub fn start(self) -> Result<RunReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let threads = self.config.threads;
        let span = tracing::info_span!("run", %run_id, threads);
        let _enter = span.enter();

        let mut registry = ProcedureRegistry::new();
        self.workload.prepare_procedures(&mut registry);
        info!(procedures = registry.len(), "procedures prepared");

        let state = RunState::new(threads);
        let shared = Shared {
            workload: &self.workload,
            registry: &registry,
            source: self.source.as_ref(),
            affinity: self.affinity.as_ref(),
            retry: self.retry.as_ref(),
            lock: self.lock.as_ref(),
            state: &state,
            span: &span,
            seed: self.config.seed,
            output_capacity: self.config.output_capacity,
        };

        let mut failure: Option<Error> = None;
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(threads);
            for i in 0..threads {
                let shared = &shared;
                let spawned = std::thread::Builder::new()
                    .name(format!("htm-worker-{}", i))
                    .spawn_scoped(scope, move || worker::run(shared, ThreadId(i)));
                match spawned {
                    Ok(handle) => handles.push((ThreadId(i), handle)),
                    Err(err) => {
                        state.cancel();
                        failure = Some(Error::InvalidConfig(format!(
                            "failed to spawn worker {}: {}",
                            i, err
                        )));
                        break;
                    }
                }
            }

            if failure.is_none() && state.open_barrier() {
                info!("start processing");
            }

            for (thread, handle) in handles {
                let outcome = match handle.join() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::WorkerPanicked { thread }),
                };
                if let Err(err) = outcome {
                    record_failure(&mut failure, err);
                }
            }
        });

        if let Some(err) = failure {
            tracing::error!(error = %err, "run failed");
            return Err(err);
        }

        let report = RunReport {
            run_id,
            started_at,
            thread_count: threads,
            execute_count: state.total_committed(),
            abort_count: state.total_aborted(),
            elapsed: state.elapsed(),
            lock_stats: self.lock.as_ref().and_then(|lock| lock.stats()),
        };
        info!(
            execute_count = report.execute_count,
            abort_count = report.abort_count,
            elapsed_ms = report.elapsed_ms(),
            "run finished"
        );
        println!("{}", report);
        Ok(report)
    }
}

/// Keep the most informative error: a worker's own failure beats the
/// cancellation it caused in the others.
fn record_failure(slot: &mut Option<Error>, err: Error) {
    match slot {
        None => *slot = Some(err),
        Some(Error::Cancelled(_)) if !matches!(err, Error::Cancelled(_)) => {
            debug!("replacing cancellation with root cause");
            *slot = Some(err);
        }
        Some(_) => {}
    }
}
