use chrono::NaiveDate;
use serde::Serialize;

use crate::owner::OwnershipRecord;

use super::{DateConstraints, OwnershipChain};

/// Why a candidate date was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", content = "bound", rename_all = "snake_case")]
pub enum DateError {
    /// No start date was given.
    #[error("start date is required")]
    StartRequired,
    /// An end date was given without a start date.
    #[error("pick a start date before choosing an end date")]
    StartMissingForEnd,
    /// Start date falls before the allowed window.
    #[error("start date cannot be before {0}")]
    StartBeforeMin(NaiveDate),
    /// Start date falls after the allowed window.
    #[error("start date cannot be after {0}")]
    StartAfterMax(NaiveDate),
    /// The mode requires an end date and none was given.
    #[error("end date is required")]
    EndRequired,
    /// End date is on or before the start date.
    #[error("end date must be after the start date")]
    EndNotAfterStart,
    /// End date falls before the allowed window.
    #[error("end date cannot be before {0}")]
    EndBeforeMin(NaiveDate),
    /// End date falls after the allowed window.
    #[error("end date cannot be after {0}")]
    EndAfterMax(NaiveDate),
}

/// At most one error per input field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationErrors {
    /// Error attached to the start-date input.
    pub start: Option<DateError>,
    /// Error attached to the end-date input.
    pub end: Option<DateError>,
}

impl ValidationErrors {
    /// True when the candidate pair was accepted.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Errors in field order, start first.
    pub fn iter(&self) -> impl Iterator<Item = &DateError> {
        self.start.iter().chain(self.end.iter())
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for err in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
            first = false;
        }
        Ok(())
    }
}

/// Form rules layered on top of the date windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationContext {
    /// A start date must be supplied.
    pub start_required: bool,
    /// An end date must be supplied.
    pub end_required: bool,
    /// The record stays open; any candidate end date is ignored.
    pub open_ended: bool,
}

impl ValidationContext {
    /// Rules for adding a record to `chain`.
    ///
    /// A historical record goes before every existing one, so it must be closed unless the
    /// chain is empty.
    pub fn for_add(chain: &OwnershipChain, transfer: bool) -> Self {
        Self {
            start_required: true,
            end_required: !transfer && !chain.is_empty(),
            open_ended: transfer,
        }
    }

    /// Rules for editing `target`. Former owners must keep an end date.
    pub fn for_edit(target: &OwnershipRecord) -> Self {
        Self {
            start_required: true,
            end_required: !target.is_current_owner,
            open_ended: target.is_current_owner,
        }
    }
}

/// Checks a candidate date pair against `constraints` and `context`.
pub fn validate(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    constraints: &DateConstraints,
    context: &ValidationContext,
) -> ValidationErrors {
    let end = if context.open_ended { None } else { end };
    let mut errors = ValidationErrors::default();

    match (start, end) {
        (None, Some(_)) => errors.start = Some(DateError::StartMissingForEnd),
        (None, None) if context.start_required => errors.start = Some(DateError::StartRequired),
        _ => {}
    }

    if let Some(start) = start {
        errors.start = match (constraints.min_start_date, constraints.max_start_date) {
            (Some(min), _) if start < min => Some(DateError::StartBeforeMin(min)),
            (_, Some(max)) if start > max => Some(DateError::StartAfterMax(max)),
            _ => None,
        };
    }

    match end {
        Some(end) => {
            errors.end = if start.is_some_and(|start| end <= start) {
                Some(DateError::EndNotAfterStart)
            } else {
                match (constraints.min_end_date, constraints.max_end_date) {
                    (Some(min), _) if end < min => Some(DateError::EndBeforeMin(min)),
                    (_, Some(max)) if end > max => Some(DateError::EndAfterMax(max)),
                    _ => None,
                }
            };
        }
        None if context.end_required => errors.end = Some(DateError::EndRequired),
        None => {}
    }

    errors
}
