//! Thread-to-core placement
//!
//! The harness asks an [`AffinityResolver`] which core a worker runs on,
//! pins the worker there, and derives the NUMA node procedures are built
//! for. A pin failure is logged and the worker runs unpinned.

use htmbench_core::{CoreId, Error, NodeId, Result, ThreadId};

/// Placement policy for workers
pub trait AffinityResolver: Send + Sync {
    /// Core the worker should run on
    fn core_for_thread(&self, thread: ThreadId) -> CoreId;

    /// NUMA node owning `core`
    fn numa_node(&self, core: CoreId) -> NodeId;

    /// Pin the calling thread to `core`
    fn pin(&self, core: CoreId) -> Result<()>;

    /// Check that the policy can place `thread_count` workers
    fn validate(&self, thread_count: usize) -> Result<()> {
        let _ = thread_count;
        Ok(())
    }
}

/// Identity placement without pinning; every core is on node 0
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPinning;

impl AffinityResolver for NoPinning {
    fn core_for_thread(&self, thread: ThreadId) -> CoreId {
        CoreId(thread.get())
    }

    fn numa_node(&self, _core: CoreId) -> NodeId {
        NodeId(0)
    }

    fn pin(&self, _core: CoreId) -> Result<()> {
        Ok(())
    }
}

/// Explicit thread-to-core map with evenly sized NUMA nodes
#[derive(Debug, Clone)]
pub struct CoreMap {
    cores: Vec<CoreId>,
    cores_per_node: usize,
}

impl CoreMap {
    /// Map worker `i` to `cores[i]`; node of a core is `core / cores_per_node`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAffinity`] when `cores` is empty or `cores_per_node`
    /// is zero.
    pub fn new(cores: Vec<CoreId>, cores_per_node: usize) -> Result<Self> {
        if cores.is_empty() {
            return Err(Error::InvalidAffinity("core map is empty".into()));
        }
        if cores_per_node == 0 {
            return Err(Error::InvalidAffinity("cores_per_node must be positive".into()));
        }
        Ok(Self {
            cores,
            cores_per_node,
        })
    }

    /// Map worker `i` to core `i` for `thread_count` workers
    pub fn identity(thread_count: usize, cores_per_node: usize) -> Result<Self> {
        Self::new((0..thread_count).map(CoreId).collect(), cores_per_node)
    }

    /// Mapped cores in worker order
    pub fn cores(&self) -> &[CoreId] {
        &self.cores
    }
}

impl AffinityResolver for CoreMap {
    fn core_for_thread(&self, thread: ThreadId) -> CoreId {
        self.cores
            .get(thread.get())
            .copied()
            .unwrap_or(CoreId(thread.get()))
    }

    fn numa_node(&self, core: CoreId) -> NodeId {
        NodeId(core.get() / self.cores_per_node)
    }

    fn pin(&self, core: CoreId) -> Result<()> {
        pin_current_thread(core)
    }

    fn validate(&self, thread_count: usize) -> Result<()> {
        if self.cores.len() < thread_count {
            return Err(Error::InvalidAffinity(format!(
                "{} cores mapped for {} workers",
                self.cores.len(),
                thread_count
            )));
        }
        Ok(())
    }
}

/// Pin the calling thread to a single core
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: CoreId) -> Result<()> {
    // CPU_SET indexes a fixed-size mask.
    let max = 8 * std::mem::size_of::<libc::cpu_set_t>();
    if core.get() >= max {
        return Err(Error::InvalidAffinity(format!("{} beyond cpu set size {}", core, max)));
    }
    // SAFETY: cpu_set_t is plain data and the mask outlives the call.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core.get(), &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc != 0 {
        return Err(Error::InvalidAffinity(format!(
            "sched_setaffinity({}) failed: {}",
            core,
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Pin the calling thread to a single core
#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(core: CoreId) -> Result<()> {
    Err(Error::InvalidAffinity(format!(
        "pinning to {} is not supported on this platform",
        core
    )))
}
