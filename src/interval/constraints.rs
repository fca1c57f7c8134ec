use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::OwnershipId;

use super::{IntervalError, OwnershipChain};

/// Inclusive bounds for a candidate start/end pair. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateConstraints {
    /// Earliest allowed start date.
    pub min_start_date: Option<NaiveDate>,
    /// Latest allowed start date.
    pub max_start_date: Option<NaiveDate>,
    /// Earliest allowed end date.
    pub min_end_date: Option<NaiveDate>,
    /// Latest allowed end date.
    pub max_end_date: Option<NaiveDate>,
}

impl DateConstraints {
    /// True when no bound is set.
    pub fn is_unbounded(&self) -> bool {
        self == &Self::default()
    }
}

impl OwnershipChain {
    /// Bounds for a new record.
    ///
    /// A transfer cannot start before the current owner's tenure began. A historical insertion
    /// goes before the earliest existing record, so both its dates are capped at that record's
    /// start.
    pub fn add_constraints(&self, transfer: bool) -> DateConstraints {
        let mut out = DateConstraints::default();

        if transfer {
            if let Some(current) = self.current_owner() {
                out.min_start_date = Some(current.ownership_start_date);
            }
        } else if let Some(earliest) = self.earliest() {
            out.max_start_date = Some(earliest.ownership_start_date);
            out.max_end_date = Some(earliest.ownership_start_date);
        }

        out
    }

    /// Bounds for editing record `id` in place.
    ///
    /// `today` caps the end date of former owners whose successor is missing or starts in the
    /// future.
    pub fn edit_constraints(
        &self,
        id: OwnershipId,
        today: NaiveDate,
    ) -> Result<DateConstraints, IntervalError> {
        let n = self.neighbors(id)?;
        let mut out = DateConstraints::default();

        if let Some(prev) = n.previous {
            out.min_start_date = Some(prev.ownership_start_date);
        }

        if let Some(next) = n.next {
            out.max_end_date = Some(next.ownership_start_date);
            if let Some(end) = n.target.ownership_end_date {
                out.max_start_date = Some(end);
            }
        }

        if n.target.is_current_owner {
            if let Some(prev) = n.previous {
                out.min_start_date = Some(prev.ownership_end_date.unwrap_or(prev.ownership_start_date));
            }
        } else {
            match n.next {
                Some(next) if next.ownership_start_date <= today => {}
                _ => out.max_end_date = Some(today),
            }
        }

        Ok(out)
    }
}
