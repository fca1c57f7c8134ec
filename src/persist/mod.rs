//! Durable journal of ownership ops.

pub mod sqlite;

use crate::{
    core::store::{StoreError, StoreSnapshotV1},
    op::StoredOp,
    types::OpSeq,
};

/// Journal failure.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Database error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Op or snapshot payload failed to encode or decode.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// A journaled op did not replay.
    #[error("replay: {0}")]
    Store(#[from] StoreError),
    /// Anything else, already formatted.
    #[error("{0}")]
    Message(String),
}

/// Result of a journal call.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for journaled ownership ops.
pub trait OpSink: Send {
    /// Appends `ops` in order and returns the highest sequence written.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Makes appended ops durable.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Stores `snapshot` as covering every op through `last_seq`.
    fn write_snapshot(&mut self, _snapshot: &StoreSnapshotV1, _last_seq: OpSeq) -> PersistResult<()> {
        Ok(())
    }
    /// Drops ops with sequence `<= seq` and returns how many went.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
