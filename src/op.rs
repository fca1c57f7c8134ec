//! Mutation operation model and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::{
    owner::{OwnershipPatch, OwnershipRecord},
    types::{GemstoneId, OpSeq, OwnershipId},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Insert a fully materialized record.
    Insert {
        /// Inserted record.
        record: OwnershipRecord,
    },
    /// Patch a record, including the inverse patch for audit.
    Patch {
        /// Record id to mutate.
        id: OwnershipId,
        /// Forward patch.
        patch: OwnershipPatch,
        /// Inverse patch that restores prior state.
        prev: OwnershipPatch,
    },
    /// Delete a record, keeping its last state.
    Remove {
        /// Removed record.
        record: OwnershipRecord,
    },
}

impl Op {
    /// Record the op touches.
    pub fn ownership_id(&self) -> OwnershipId {
        match self {
            Op::Insert { record } | Op::Remove { record } => record.id,
            Op::Patch { id, .. } => *id,
        }
    }

    /// Gemstone of the record, when the op carries it.
    pub fn gemstone_id(&self) -> Option<GemstoneId> {
        match self {
            Op::Insert { record } | Op::Remove { record } => Some(record.gemstone_id),
            Op::Patch { .. } => None,
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
