//! WAL Entry definitions
//!
//! A logical log record is one serialized [`WalEntry`]: a batch of
//! operations and the sequence number assigned to its first operation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memtable::{SequenceNumber, MAX_SEQUENCE_NUMBER};

/// A single logical record in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Sequence of the first operation; the rest follow consecutively
    pub sequence: SequenceNumber,

    /// The operations, applied in order
    pub batch: WriteBatch,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

/// Ordered group of operations written atomically
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(Operation::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(Operation::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.ops.iter()
    }
}

impl From<Vec<Operation>> for WriteBatch {
    fn from(ops: Vec<Operation>) -> Self {
        Self { ops }
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl WalEntry {
    pub fn new(sequence: SequenceNumber, batch: WriteBatch) -> Self {
        Self { sequence, batch }
    }

    /// Serialize to the payload of one log record
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a log record payload
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Sequence of the last operation in the batch
    ///
    /// Equals `sequence - 1` for an empty batch.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.sequence
            .saturating_add(self.batch.len() as u64)
            .saturating_sub(1)
    }

    /// Like [`last_sequence`](Self::last_sequence), but `None` when some
    /// operation would get a sequence above `MAX_SEQUENCE_NUMBER`
    pub fn checked_last_sequence(&self) -> Option<SequenceNumber> {
        let end = self.sequence.checked_add(self.batch.len() as u64)?;
        (end <= MAX_SEQUENCE_NUMBER + 1).then(|| end.saturating_sub(1))
    }
}
