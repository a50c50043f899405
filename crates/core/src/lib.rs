//! Core types for htmbench
//!
//! This crate defines the vocabulary shared by the lock and the harness:
//! - [`types`]: identifiers for runs, worker threads, cores, NUMA nodes and transaction types
//! - [`error`]: the error taxonomy and [`Result`] alias
//! - [`param`]: the transaction-parameter contract and fixed-size parameter batches

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod param;
pub mod types;

pub use error::{Error, Result};
pub use param::{decode_param, encode_param, ParamBatch, TxnParam};
pub use types::{CoreId, NodeId, RunId, ThreadId, TxnType};
