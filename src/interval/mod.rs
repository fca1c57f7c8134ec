//! Ownership interval consistency for one gemstone.
//!
//! Everything here is a pure function of an [`OwnershipChain`], a chronologically sorted copy of
//! a gemstone's records. Callers refetch the authoritative list after every mutation and rebuild
//! the chain; nothing in this module holds state between calls.

/// Neighbor boundary propagation after an edit.
pub mod cascade;
/// Date-picker windows for add and edit forms.
pub mod constraints;
/// Field-keyed validation of a candidate date pair.
pub mod validate;

use chrono::NaiveDate;

use crate::{owner::OwnershipRecord, types::OwnershipId};

pub use cascade::{CascadeKind, CascadeUpdate};
pub use constraints::DateConstraints;
pub use validate::{DateError, ValidationContext, ValidationErrors, validate};

/// Lookup failure against a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    /// The id does not belong to any record in the chain.
    #[error("ownership record {0} is not part of this chain")]
    UnknownRecord(OwnershipId),
}

/// Structural problem found by [`OwnershipChain::violations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// More than one record carries the current-owner flag.
    MultipleCurrentOwners(Vec<OwnershipId>),
    /// The current owner is not the chronologically last record.
    CurrentOwnerNotLast(OwnershipId),
    /// A record's end date is not strictly after its start date.
    EmptyInterval(OwnershipId),
    /// A record ends after its successor starts, or never ends.
    Overlap {
        /// Earlier record.
        before: OwnershipId,
        /// Later record.
        after: OwnershipId,
    },
    /// A record ends before its successor starts.
    Gap {
        /// Earlier record.
        before: OwnershipId,
        /// Later record.
        after: OwnershipId,
    },
}

/// A record together with its chronological neighbors.
#[derive(Debug, Clone, Copy)]
pub struct Neighbors<'a> {
    /// Record immediately before `target`.
    pub previous: Option<&'a OwnershipRecord>,
    /// The record looked up.
    pub target: &'a OwnershipRecord,
    /// Record immediately after `target`.
    pub next: Option<&'a OwnershipRecord>,
}

/// Ownership records of one gemstone, sorted by start date ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnershipChain {
    records: Vec<OwnershipRecord>,
}

impl OwnershipChain {
    /// Sorts `records` into chronological order.
    ///
    /// Records sharing a start date keep the current owner last, then order by id.
    pub fn from_records(mut records: Vec<OwnershipRecord>) -> Self {
        records.sort_by(|a, b| {
            a.ownership_start_date
                .cmp(&b.ownership_start_date)
                .then(a.is_current_owner.cmp(&b.is_current_owner))
                .then(a.id.cmp(&b.id))
        });
        Self { records }
    }

    /// Sorted records.
    pub fn records(&self) -> &[OwnershipRecord] {
        &self.records
    }

    /// Consumes the chain, returning the sorted records.
    pub fn into_records(self) -> Vec<OwnershipRecord> {
        self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the gemstone has no ownership history.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Chronologically first record.
    pub fn earliest(&self) -> Option<&OwnershipRecord> {
        self.records.first()
    }

    /// Record flagged as current owner, if any.
    pub fn current_owner(&self) -> Option<&OwnershipRecord> {
        self.records.iter().find(|r| r.is_current_owner)
    }

    /// Looks up a record by id.
    pub fn get(&self, id: OwnershipId) -> Option<&OwnershipRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Index of `id` in chronological order.
    pub fn position(&self, id: OwnershipId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Returns `id` with its previous and next records.
    pub fn neighbors(&self, id: OwnershipId) -> Result<Neighbors<'_>, IntervalError> {
        let idx = self.position(id).ok_or(IntervalError::UnknownRecord(id))?;
        Ok(Neighbors {
            previous: idx.checked_sub(1).map(|i| &self.records[i]),
            target: &self.records[idx],
            next: self.records.get(idx + 1),
        })
    }

    /// Lists every structural violation of the chain invariants.
    ///
    /// An empty result means: at most one current owner, positioned last, every closed interval
    /// non-empty, and each record ending exactly where its successor starts.
    pub fn violations(&self) -> Vec<ChainViolation> {
        let mut out = Vec::new();

        let current: Vec<OwnershipId> = self
            .records
            .iter()
            .filter(|r| r.is_current_owner)
            .map(|r| r.id)
            .collect();
        if current.len() > 1 {
            out.push(ChainViolation::MultipleCurrentOwners(current.clone()));
        }
        if let (Some(id), Some(last)) = (current.first(), self.records.last()) {
            if current.len() == 1 && last.id != *id {
                out.push(ChainViolation::CurrentOwnerNotLast(*id));
            }
        }

        for rec in &self.records {
            if rec
                .ownership_end_date
                .is_some_and(|end| end <= rec.ownership_start_date)
            {
                out.push(ChainViolation::EmptyInterval(rec.id));
            }
        }

        for pair in self.records.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            let boundary = after.ownership_start_date;
            match before.ownership_end_date {
                Some(end) if end > boundary => out.push(ChainViolation::Overlap {
                    before: before.id,
                    after: after.id,
                }),
                Some(end) if end < boundary => out.push(ChainViolation::Gap {
                    before: before.id,
                    after: after.id,
                }),
                Some(_) => {}
                None => out.push(ChainViolation::Overlap {
                    before: before.id,
                    after: after.id,
                }),
            }
        }

        out
    }

    /// True when `a` and `b` share at least one day, treating open ends as unbounded.
    pub fn overlaps(a: &OwnershipRecord, b: &OwnershipRecord) -> bool {
        fn before_end(day: NaiveDate, end: Option<NaiveDate>) -> bool {
            end.is_none_or(|end| day < end)
        }
        before_end(a.ownership_start_date, b.ownership_end_date)
            && before_end(b.ownership_start_date, a.ownership_end_date)
    }
}
