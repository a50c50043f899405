//! Run report

use chrono::{DateTime, Utc};
use htmbench_concurrency::LockStatsSnapshot;
use htmbench_core::RunId;
use std::time::Duration;

/// Result of one benchmark run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Unique id of the run
    pub run_id: RunId,
    /// Wall-clock time the run was started
    pub started_at: DateTime<Utc>,
    /// Number of workers
    pub thread_count: usize,
    /// Committed transactions across all workers
    pub execute_count: u64,
    /// Aborted attempts across all workers
    pub abort_count: u64,
    /// Time from barrier release to the first worker finishing
    pub elapsed: Duration,
    /// Shared lock counters, when the run had a lock and profiling is built in
    pub lock_stats: Option<LockStatsSnapshot>,
}

impl RunReport {
    /// `abort_count / (execute_count + 1)`
    pub fn abort_rate(&self) -> f64 {
        self.abort_count as f64 / (self.execute_count as f64 + 1.0)
    }

    /// Elapsed time in whole milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    /// Committed transactions per millisecond, i.e. thousands per second
    ///
    /// Zero when the run took less than a millisecond.
    pub fn throughput_ktps(&self) -> f64 {
        match self.elapsed_ms() {
            0 => 0.0,
            ms => self.execute_count as f64 / ms as f64,
        }
    }

    /// Throughput divided by the number of workers
    pub fn per_core_throughput_ktps(&self) -> f64 {
        if self.thread_count == 0 {
            return 0.0;
        }
        self.throughput_ktps() / self.thread_count as f64
    }

    /// Machine-readable form of the report
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id,
            "started_at": self.started_at,
            "thread_count": self.thread_count,
            "execute_count": self.execute_count,
            "abort_count": self.abort_count,
            "abort_rate": self.abort_rate(),
            "elapsed_ms": self.elapsed_ms(),
            "throughput_ktps": self.throughput_ktps(),
            "per_core_throughput_ktps": self.per_core_throughput_ktps(),
            "lock_stats": self.lock_stats,
        })
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "execute_count={}, abort_count={}, abort_rate={}",
            self.execute_count,
            self.abort_count,
            self.abort_rate()
        )?;
        writeln!(f, "elapsed_time={}ms", self.elapsed_ms())?;
        writeln!(f, "throughput={}K tps", self.throughput_ktps())?;
        write!(f, "per-core throughput={}K tps", self.per_core_throughput_ktps())?;
        if let Some(stats) = &self.lock_stats {
            write!(f, "\n{}", stats)?;
        }
        Ok(())
    }
}
