/// SQLite journal sink implementation.
pub mod sqlite;

use crate::{
    core::store::StoreSnapshotV1,
    op::StoredOp,
    types::OpSeq,
};

/// Errors surfaced by journal sinks.
#[derive(Debug)]
pub enum PersistError {
    /// SQLite-level failure.
    Sqlite(rusqlite::Error),
    /// Payload encode/decode failure.
    Serde(serde_json::Error),
    /// Any other failure, described.
    Message(String),
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<crate::core::store::StoreError> for PersistError {
    fn from(value: crate::core::store::StoreError) -> Self {
        Self::Message(format!("store error: {value:?}"))
    }
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Append-only sink for journaled ops and snapshots.
pub trait OpSink: Send {
    /// Appends a batch of ops, returning the last durable sequence.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Forces buffered writes to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Records a full-store snapshot covering `_last_seq`.
    fn write_snapshot(&mut self, _snapshot: &StoreSnapshotV1, _last_seq: OpSeq) -> PersistResult<()> {
        Ok(())
    }
    /// Deletes journal rows covered by a snapshot; returns rows removed.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
