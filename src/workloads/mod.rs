//! Reference workloads
//!
//! - [`micro`]: increments and transfers on a shared slot table

pub mod micro;

pub use micro::{MicroConfig, MicroParam, MicroWorkload, SlotTable};
