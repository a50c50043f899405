//! Transaction parameters and parameter batches
//!
//! A parameter is the input to one transaction: a [`TxnType`] tag that
//! selects the stored procedure, plus a payload the procedure interprets.
//! The harness never looks inside the payload; it only asks the parameter
//! to serialize itself into an opaque byte buffer so a worker can rebuild a
//! private copy through the workload's deserialize hook.
//!
//! [`encode_param`] and [`decode_param`] are the bincode helpers workloads
//! use for serde-derived parameter types.

use crate::error::Result;
use crate::types::TxnType;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Input record for one transaction
pub trait TxnParam: Send + 'static {
    /// Tag selecting the stored procedure for this parameter
    fn txn_type(&self) -> TxnType;

    /// Append the serialized payload to `out`
    ///
    /// The bytes must be enough for the workload's `deserialize_param` to
    /// rebuild an equal parameter without touching the original.
    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// Serialize a serde-derived parameter payload with bincode, appending to `out`
pub fn encode_param<T: Serialize + ?Sized>(value: &T, out: &mut Vec<u8>) -> Result<()> {
    bincode::serialize_into(out, value)?;
    Ok(())
}

/// Deserialize a bincode-encoded parameter payload
pub fn decode_param<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Ordered parameter sequence with a fixed maximum size
///
/// The capacity is fixed at construction; [`ParamBatch::try_push`] hands the
/// parameter back once the batch is full.
#[derive(Debug, Clone)]
pub struct ParamBatch<P> {
    params: Vec<P>,
    capacity: usize,
}

impl<P> ParamBatch<P> {
    /// Create an empty batch holding at most `capacity` parameters
    pub fn new(capacity: usize) -> Self {
        Self {
            params: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a parameter, returning it back if the batch is full
    pub fn try_push(&mut self, param: P) -> std::result::Result<(), P> {
        if self.is_full() {
            return Err(param);
        }
        self.params.push(param);
        Ok(())
    }

    /// Split `params` into consecutive batches of at most `capacity` each
    ///
    /// A zero capacity is treated as one.
    pub fn chunk(params: impl IntoIterator<Item = P>, capacity: usize) -> Vec<ParamBatch<P>> {
        let capacity = capacity.max(1);
        let mut batches = Vec::new();
        let mut current = ParamBatch::new(capacity);
        for param in params {
            if let Err(param) = current.try_push(param) {
                batches.push(std::mem::replace(&mut current, ParamBatch::new(capacity)));
                // A fresh batch always has room.
                let _ = current.try_push(param);
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    /// Maximum number of parameters
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of parameters held
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the batch holds no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Check if the batch is at capacity
    pub fn is_full(&self) -> bool {
        self.params.len() >= self.capacity
    }

    /// Parameter at `idx`
    pub fn get(&self, idx: usize) -> Option<&P> {
        self.params.get(idx)
    }

    /// Iterate parameters in order
    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.params.iter()
    }
}

impl<P> IntoIterator for ParamBatch<P> {
    type Item = P;
    type IntoIter = std::vec::IntoIter<P>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}

impl<'a, P> IntoIterator for &'a ParamBatch<P> {
    type Item = &'a P;
    type IntoIter = std::slice::Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
