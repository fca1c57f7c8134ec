use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    op::{Op, StoredOp},
    owner::{OwnershipDraft, OwnershipPatch, OwnershipRecord},
    types::{GemstoneId, OpSeq, OwnershipId},
};

use super::indices::VecIndex;

/// Mutation rejected by the store. Rejected mutations leave no trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("ownership record {0} not found")]
    MissingRecord(OwnershipId),
    /// Id collision during snapshot load or replay.
    #[error("ownership record {0} already exists")]
    AlreadyExists(OwnershipId),
    /// The end date would not be after the start date.
    #[error("end date {end} must be after start date {start}")]
    EmptyInterval {
        /// Resulting start date.
        start: NaiveDate,
        /// Resulting end date.
        end: NaiveDate,
    },
    /// Closing the current owner at the transfer date would leave it empty.
    #[error("transfer must start after the current owner's start date {current_start}")]
    TransferNotAfterCurrent {
        /// Start date of the current owner.
        current_start: NaiveDate,
    },
    /// An open-ended non-transfer record was added while someone owns the stone.
    #[error("gemstone {0} already has a current owner")]
    CurrentOwnerExists(GemstoneId),
    /// An open-ended record would not be the last one.
    #[error("an open-ended record must start after every existing record of gemstone {0}")]
    OpenIntervalNotLast(GemstoneId),
}

/// Serializable store state, version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next id to hand out.
    pub next_ownership_id: OwnershipId,
    /// Next op sequence to hand out.
    pub next_op_seq: OpSeq,
    /// Insertion order of live records.
    pub order: Vec<OwnershipId>,
    /// Live records in `order`.
    pub records: Vec<OwnershipRecord>,
}

/// Authoritative ownership records for every gemstone.
///
/// Mutations enforce the storage-side chain rules: a single current owner per gemstone that
/// starts after every other record, and no empty intervals. Interval windows between neighbors
/// are the caller's concern (see [`crate::interval`]).
#[derive(Debug, Default)]
pub struct OwnershipStore {
    records: HashMap<OwnershipId, OwnershipRecord>,
    order: Vec<OwnershipId>,
    by_gemstone: VecIndex<GemstoneId>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
    next_ownership_id: OwnershipId,
}

impl OwnershipStore {
    /// Empty store; ids and sequences start at 1.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            next_ownership_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_ownership_id: snapshot.next_ownership_id,
            next_op_seq: snapshot.next_op_seq,
            order: snapshot.order,
            ..Self::default()
        };

        for rec in snapshot.records {
            if store.records.contains_key(&rec.id) {
                return Err(StoreError::AlreadyExists(rec.id));
            }
            store.insert_indices(&rec);
            store.records.insert(rec.id, rec);
        }

        Ok(store)
    }

    /// Captures the current state.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        let records = self
            .order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();

        StoreSnapshotV1 {
            next_ownership_id: self.next_ownership_id,
            next_op_seq: self.next_op_seq,
            order: self.order.clone(),
            records,
        }
    }

    /// Adds a record to `gemstone`.
    ///
    /// With `transfer`, the end date is dropped, the current owner is closed at the new start
    /// date, and the new record becomes current. Returns the journal ops in apply order.
    pub fn add(
        &mut self,
        gemstone: GemstoneId,
        draft: OwnershipDraft,
        transfer: bool,
    ) -> Result<(OwnershipId, Vec<StoredOp>), StoreError> {
        let start = draft.ownership_start_date;
        let current = self
            .current_owner(gemstone)
            .map(|r| (r.id, r.ownership_start_date));

        let (end, is_current) = match (transfer, draft.ownership_end_date) {
            (true, _) => {
                if let Some((_, current_start)) = current {
                    if start <= current_start {
                        return Err(StoreError::TransferNotAfterCurrent { current_start });
                    }
                }
                (None, true)
            }
            (false, Some(end)) => {
                if end <= start {
                    return Err(StoreError::EmptyInterval { start, end });
                }
                (Some(end), false)
            }
            (false, None) => {
                if current.is_some() {
                    return Err(StoreError::CurrentOwnerExists(gemstone));
                }
                (None, true)
            }
        };

        if is_current {
            let closing = current.map(|(id, _)| id);
            let later_exists = self
                .list(gemstone)
                .iter()
                .any(|r| Some(r.id) != closing && r.ownership_start_date >= start);
            if later_exists {
                return Err(StoreError::OpenIntervalNotLast(gemstone));
            }
        }

        let mut ops = Vec::with_capacity(2);
        if let (true, Some((current_id, _))) = (transfer, current) {
            let close = OwnershipPatch {
                ownership_end_date: Some(Some(start)),
                is_current_owner: Some(false),
                ..OwnershipPatch::default()
            };
            ops.push(self.apply_patch(current_id, close)?);
        }

        let id = self.next_ownership_id;
        self.next_ownership_id += 1;

        let record = OwnershipRecord {
            id,
            gemstone_id: gemstone,
            owner_name: draft.owner_name,
            owner_phone: draft.owner_phone,
            owner_email: draft.owner_email,
            owner_address: draft.owner_address,
            notes: draft.notes,
            ownership_start_date: start,
            ownership_end_date: end,
            is_current_owner: is_current,
        };
        ops.push(self.apply_insert(record)?);

        debug!(gemstone, id, transfer, ops = ops.len(), "ownership record added");
        self.pending_ops.extend(ops.iter().cloned());
        Ok((id, ops))
    }

    /// Updates record `id`.
    ///
    /// The current-owner flag never changes here, and a current owner's end date is always
    /// cleared.
    pub fn update(&mut self, id: OwnershipId, mut patch: OwnershipPatch) -> Result<StoredOp, StoreError> {
        let rec = self.records.get(&id).ok_or(StoreError::MissingRecord(id))?;

        patch.is_current_owner = None;
        if rec.is_current_owner {
            patch.ownership_end_date = rec.ownership_end_date.map(|_| None);
        }

        let mut preview = rec.clone();
        patch.apply_to(&mut preview);
        if let Some(end) = preview.ownership_end_date {
            if end <= preview.ownership_start_date {
                return Err(StoreError::EmptyInterval {
                    start: preview.ownership_start_date,
                    end,
                });
            }
        }

        let stored = self.apply_patch(id, patch)?;
        debug!(id, seq = stored.seq, "ownership record updated");
        self.pending_ops.push(stored.clone());
        Ok(stored)
    }

    /// Deletes record `id`.
    pub fn remove(&mut self, id: OwnershipId) -> Result<StoredOp, StoreError> {
        if !self.records.contains_key(&id) {
            return Err(StoreError::MissingRecord(id));
        }
        let seq = self.take_next_op_seq();
        let stored = self.apply_remove_with_seq(id, seq)?;
        debug!(id, seq, "ownership record removed");
        self.pending_ops.push(stored.clone());
        Ok(stored)
    }

    /// Re-applies a journaled op verbatim, without the mutation rules.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        let seq = stored.seq;
        match stored.op {
            Op::Insert { record } => {
                self.apply_insert_with_seq(record, seq)?;
            }
            Op::Patch { id, patch, .. } => {
                self.apply_patch_with_seq(id, patch, seq)?;
            }
            Op::Remove { record } => {
                self.apply_remove_with_seq(record.id, seq)?;
            }
        }
        Ok(())
    }

    /// Record `id`, if present.
    pub fn get(&self, id: OwnershipId) -> Option<&OwnershipRecord> {
        self.records.get(&id)
    }

    /// Owned copy of record `id`.
    pub fn get_cloned(&self, id: OwnershipId) -> Option<OwnershipRecord> {
        self.get(id).cloned()
    }

    /// Records of `gemstone` in insertion order.
    pub fn list(&self, gemstone: GemstoneId) -> Vec<&OwnershipRecord> {
        self.by_gemstone
            .get(&gemstone)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Owned copies of the records of `gemstone`, insertion order.
    pub fn list_cloned(&self, gemstone: GemstoneId) -> Vec<OwnershipRecord> {
        self.list(gemstone).into_iter().cloned().collect()
    }

    /// Open record of `gemstone`, if any.
    pub fn current_owner(&self, gemstone: GemstoneId) -> Option<&OwnershipRecord> {
        self.list(gemstone).into_iter().find(|r| r.is_current_owner)
    }

    /// Live record ids in insertion order.
    pub fn ordered_ids(&self) -> &[OwnershipId] {
        &self.order
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Takes the ops produced since the last drain.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Sequence of the newest applied op, 0 before the first.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn apply_insert(&mut self, record: OwnershipRecord) -> Result<StoredOp, StoreError> {
        let seq = self.take_next_op_seq();
        self.apply_insert_with_seq(record, seq)
    }

    fn apply_insert_with_seq(&mut self, record: OwnershipRecord, seq: OpSeq) -> Result<StoredOp, StoreError> {
        if self.records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }

        let id = record.id;
        self.next_ownership_id = self.next_ownership_id.max(id.saturating_add(1));
        self.insert_indices(&record);
        self.order.push(id);
        self.records.insert(id, record.clone());

        self.bump_next_seq_from(seq);
        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Insert { record },
        })
    }

    fn apply_patch(&mut self, id: OwnershipId, patch: OwnershipPatch) -> Result<StoredOp, StoreError> {
        let seq = self.take_next_op_seq();
        self.apply_patch_with_seq(id, patch, seq)
    }

    fn apply_patch_with_seq(&mut self, id: OwnershipId, patch: OwnershipPatch, seq: OpSeq) -> Result<StoredOp, StoreError> {
        let rec = self.records.get_mut(&id).ok_or(StoreError::MissingRecord(id))?;
        let prev = patch.capture_inverse_for(rec);
        patch.apply_to(rec);

        self.bump_next_seq_from(seq);
        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Patch { id, patch, prev },
        })
    }

    fn apply_remove_with_seq(&mut self, id: OwnershipId, seq: OpSeq) -> Result<StoredOp, StoreError> {
        let record = self.records.remove(&id).ok_or(StoreError::MissingRecord(id))?;
        if let Some(ids) = self.by_gemstone.get_mut(&record.gemstone_id) {
            Self::remove_from_vec_index(ids, id);
        }
        Self::remove_from_vec_index(&mut self.order, id);

        self.bump_next_seq_from(seq);
        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Remove { record },
        })
    }

    fn insert_indices(&mut self, rec: &OwnershipRecord) {
        self.by_gemstone
            .entry(rec.gemstone_id)
            .or_default()
            .push(rec.id);
    }

    fn remove_from_vec_index(v: &mut Vec<OwnershipId>, id: OwnershipId) {
        if let Some(pos) = v.iter().position(|x| *x == id) {
            v.remove(pos);
        }
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
