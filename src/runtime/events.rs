//! Runtime event stream payloads.

use crate::types::{GemstoneId, OpSeq, OwnershipId};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A new ownership record was added.
    Added {
        /// Gemstone of the record.
        gemstone: GemstoneId,
        /// Added record id.
        id: OwnershipId,
    },
    /// An existing record was updated, including a transfer closing the previous owner.
    Updated {
        /// Gemstone of the record.
        gemstone: GemstoneId,
        /// Updated record id.
        id: OwnershipId,
    },
    /// A record was removed.
    Removed {
        /// Gemstone of the record.
        gemstone: GemstoneId,
        /// Removed record id.
        id: OwnershipId,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
