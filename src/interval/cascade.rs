use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{owner::OwnershipPatch, types::OwnershipId};

use super::{IntervalError, OwnershipChain};

/// Which boundary of a neighbor moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeKind {
    /// The previous record's end date follows the edited start date.
    PreviousEnd,
    /// The next record's start date follows the edited end date.
    NextStart,
}

/// One proposed neighbor update, submitted independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeUpdate {
    /// Neighbor to update.
    pub target: OwnershipId,
    /// Boundary being moved.
    pub kind: CascadeKind,
    /// New boundary date.
    pub date: NaiveDate,
}

impl CascadeUpdate {
    /// Sparse patch that applies this update.
    pub fn to_patch(&self) -> OwnershipPatch {
        match self.kind {
            CascadeKind::PreviousEnd => OwnershipPatch::end_date(Some(self.date)),
            CascadeKind::NextStart => OwnershipPatch::start_date(self.date),
        }
    }
}

impl OwnershipChain {
    /// Neighbor updates that keep the chain contiguous after record `id` is edited.
    ///
    /// `self` is the chain as it stood before the edit. Updates come back in submission order,
    /// previous first, and a neighbor whose boundary already matches is left out. An edited
    /// current owner hands `today` to its successor, since its open tenure has no end date.
    pub fn plan_cascade(
        &self,
        id: OwnershipId,
        new_start: Option<NaiveDate>,
        new_end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<CascadeUpdate>, IntervalError> {
        let n = self.neighbors(id)?;
        let mut out = Vec::with_capacity(2);

        if let (Some(prev), Some(start)) = (n.previous, new_start) {
            if prev.ownership_end_date != Some(start) {
                out.push(CascadeUpdate {
                    target: prev.id,
                    kind: CascadeKind::PreviousEnd,
                    date: start,
                });
            }
        }

        if let Some(next) = n.next {
            let boundary = if n.target.is_current_owner {
                Some(today)
            } else {
                new_end
            };
            if let Some(date) = boundary {
                if next.ownership_start_date != date {
                    out.push(CascadeUpdate {
                        target: next.id,
                        kind: CascadeKind::NextStart,
                        date,
                    });
                }
            }
        }

        Ok(out)
    }
}
