//! Add/edit submission flow against the ownership REST collaborator.
//!
//! [`OwnershipEditor`] keeps one gemstone's chain in memory, answers date-picker bounds,
//! validates candidate dates locally, and drives the network calls in a fixed order: the primary
//! write, then best-effort neighbor cascades (previous, then next), then a refetch.

use std::future::Future;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    dates,
    interval::{
        CascadeUpdate, DateConstraints, IntervalError, OwnershipChain, ValidationContext,
        ValidationErrors, validate,
    },
    owner::OwnershipRecord,
    runtime::handle::{LedgerHandle, RuntimeError},
    types::{GemstoneId, OwnershipId},
    wire::{AddOwnershipRequest, UpdateOwnershipRequest},
};

/// The REST endpoints the editor talks to.
pub trait OwnershipApi {
    /// Transport or remote failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches every record of `gemstone`, in no particular order.
    fn list(
        &self,
        gemstone: GemstoneId,
    ) -> impl Future<Output = Result<Vec<OwnershipRecord>, Self::Error>> + Send;

    /// Creates a record.
    fn add(
        &self,
        gemstone: GemstoneId,
        request: AddOwnershipRequest,
    ) -> impl Future<Output = Result<OwnershipId, Self::Error>> + Send;

    /// Replaces the fields of record `id`.
    fn update(
        &self,
        id: OwnershipId,
        request: UpdateOwnershipRequest,
    ) -> impl Future<Output = Result<OwnershipRecord, Self::Error>> + Send;
}

impl OwnershipApi for LedgerHandle {
    type Error = RuntimeError;

    async fn list(&self, gemstone: GemstoneId) -> Result<Vec<OwnershipRecord>, RuntimeError> {
        LedgerHandle::list(self, gemstone).await
    }

    async fn add(
        &self,
        gemstone: GemstoneId,
        request: AddOwnershipRequest,
    ) -> Result<OwnershipId, RuntimeError> {
        let (draft, transfer) = request.into_draft();
        LedgerHandle::add(self, gemstone, draft, transfer).await
    }

    async fn update(
        &self,
        id: OwnershipId,
        request: UpdateOwnershipRequest,
    ) -> Result<OwnershipRecord, RuntimeError> {
        LedgerHandle::update(self, id, request.into_patch()).await
    }
}

/// Values currently entered in the add/edit form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnershipForm {
    /// Owner's name.
    pub owner_name: String,
    /// Owner's phone number.
    pub owner_phone: String,
    /// Optional email.
    pub owner_email: Option<String>,
    /// Optional postal address.
    pub owner_address: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Start date; required on submit.
    pub start: Option<NaiveDate>,
    /// End date; `None` for an open interval.
    pub end: Option<NaiveDate>,
}

impl OwnershipForm {
    /// Form prefilled from an existing record.
    pub fn from_record(record: &OwnershipRecord) -> Self {
        Self {
            owner_name: record.owner_name.clone(),
            owner_phone: record.owner_phone.clone(),
            owner_email: record.owner_email.clone(),
            owner_address: record.owner_address.clone(),
            notes: record.notes.clone(),
            start: Some(record.ownership_start_date),
            end: record.ownership_end_date,
        }
    }
}

/// Why a submit did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError<E>
where
    E: std::error::Error + 'static,
{
    /// Rejected locally; nothing was sent.
    #[error("invalid ownership dates: {0}")]
    Invalid(ValidationErrors),
    /// The form referenced a record that is not in the chain.
    #[error(transparent)]
    Interval(#[from] IntervalError),
    /// The primary call failed; the form can be resubmitted as is.
    #[error("ownership api call failed: {0}")]
    Remote(#[source] E),
}

/// Result of a committed edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    /// Edited record as returned by the update call.
    pub record: OwnershipRecord,
    /// Neighbor updates that went through.
    pub cascaded: Vec<CascadeUpdate>,
    /// Neighbor updates that failed and were dropped.
    pub failed: Vec<CascadeUpdate>,
}

/// Editing session over one gemstone's ownership history.
pub struct OwnershipEditor<A> {
    api: A,
    gemstone: GemstoneId,
    chain: OwnershipChain,
    today: Option<NaiveDate>,
    stale: bool,
}

impl<A: OwnershipApi> OwnershipEditor<A> {
    /// Fetches and sorts the history of `gemstone`.
    pub async fn load(api: A, gemstone: GemstoneId) -> Result<Self, SubmitError<A::Error>> {
        let records = api.list(gemstone).await.map_err(SubmitError::Remote)?;
        Ok(Self {
            api,
            gemstone,
            chain: OwnershipChain::from_records(records),
            today: None,
            stale: false,
        })
    }

    /// Pins the date used for "today" bounds instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Date used for "today" bounds.
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(dates::today)
    }

    /// Gemstone being edited.
    pub fn gemstone(&self) -> GemstoneId {
        self.gemstone
    }

    /// History as of the last fetch, sorted by start date.
    pub fn chain(&self) -> &OwnershipChain {
        &self.chain
    }

    /// Backing api.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// True when the last post-mutation refetch failed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Date bounds for the add form.
    pub fn add_constraints(&self, transfer: bool) -> DateConstraints {
        self.chain.add_constraints(transfer)
    }

    /// Date bounds for editing record `id`.
    pub fn edit_constraints(&self, id: OwnershipId) -> Result<DateConstraints, IntervalError> {
        self.chain.edit_constraints(id, self.today())
    }

    /// Checks `form` as a new record without submitting it.
    pub fn validate_add(&self, form: &OwnershipForm, transfer: bool) -> ValidationErrors {
        validate(
            form.start,
            form.end,
            &self.add_constraints(transfer),
            &ValidationContext::for_add(&self.chain, transfer),
        )
    }

    /// Checks `form` as an edit of record `id` without submitting it.
    pub fn validate_edit(
        &self,
        id: OwnershipId,
        form: &OwnershipForm,
    ) -> Result<ValidationErrors, IntervalError> {
        let target = self.chain.get(id).ok_or(IntervalError::UnknownRecord(id))?;
        Ok(validate(
            form.start,
            form.end,
            &self.edit_constraints(id)?,
            &ValidationContext::for_edit(target),
        ))
    }

    /// Refetches the authoritative list and rebuilds the chain.
    pub async fn refresh(&mut self) -> Result<(), SubmitError<A::Error>> {
        let records = self
            .api
            .list(self.gemstone)
            .await
            .map_err(SubmitError::Remote)?;
        self.chain = OwnershipChain::from_records(records);
        self.stale = false;
        Ok(())
    }

    /// Validates and submits a new record, then refetches.
    pub async fn submit_add(
        &mut self,
        form: &OwnershipForm,
        transfer: bool,
    ) -> Result<OwnershipId, SubmitError<A::Error>> {
        self.refresh_if_stale().await?;

        let errors = self.validate_add(form, transfer);
        let start = accepted_start(form, errors)?;

        let request = AddOwnershipRequest {
            owner_name: form.owner_name.clone(),
            owner_phone: form.owner_phone.clone(),
            owner_email: form.owner_email.clone(),
            owner_address: form.owner_address.clone(),
            ownership_start_date: start,
            ownership_end_date: if transfer { None } else { form.end },
            notes: form.notes.clone(),
            is_transfer: transfer,
        };

        let id = self
            .api
            .add(self.gemstone, request)
            .await
            .map_err(SubmitError::Remote)?;
        info!(gemstone = self.gemstone, id, transfer, "ownership record added");

        self.refresh_after_mutation().await;
        Ok(id)
    }

    /// Validates and submits an edit of record `id`, cascades the new boundaries onto its
    /// neighbors, then refetches.
    ///
    /// Cascade failures are logged and reported in [`EditOutcome::failed`]; they never undo the
    /// primary edit.
    pub async fn submit_edit(
        &mut self,
        id: OwnershipId,
        form: &OwnershipForm,
    ) -> Result<EditOutcome, SubmitError<A::Error>> {
        self.refresh_if_stale().await?;

        let errors = self.validate_edit(id, form)?;
        let start = accepted_start(form, errors)?;

        let target = self.chain.get(id).ok_or(IntervalError::UnknownRecord(id))?;
        let end = if target.is_current_owner { None } else { form.end };
        let plan = self.chain.plan_cascade(id, Some(start), end, self.today())?;

        let request = UpdateOwnershipRequest {
            owner_name: form.owner_name.clone(),
            owner_phone: form.owner_phone.clone(),
            owner_email: form.owner_email.clone(),
            owner_address: form.owner_address.clone(),
            ownership_start_date: start,
            ownership_end_date: end,
            notes: form.notes.clone(),
        };

        let record = self
            .api
            .update(id, request)
            .await
            .map_err(SubmitError::Remote)?;
        info!(gemstone = self.gemstone, id, cascades = plan.len(), "ownership record updated");

        let mut cascaded = Vec::new();
        let mut failed = Vec::new();
        for update in plan {
            let Some(neighbor) = self.chain.get(update.target) else {
                continue;
            };
            let mut moved = neighbor.clone();
            update.to_patch().apply_to(&mut moved);

            match self
                .api
                .update(update.target, UpdateOwnershipRequest::from_record(&moved))
                .await
            {
                Ok(_) => {
                    debug!(target_id = update.target, kind = ?update.kind, date = %update.date, "cascade applied");
                    cascaded.push(update);
                }
                Err(err) => {
                    warn!(
                        target_id = update.target,
                        kind = ?update.kind,
                        date = %update.date,
                        error = %err,
                        "cascade update failed; neighbor left unchanged"
                    );
                    failed.push(update);
                }
            }
        }

        self.refresh_after_mutation().await;
        Ok(EditOutcome {
            record,
            cascaded,
            failed,
        })
    }

    async fn refresh_if_stale(&mut self) -> Result<(), SubmitError<A::Error>> {
        if self.stale {
            self.refresh().await?;
        }
        Ok(())
    }

    async fn refresh_after_mutation(&mut self) {
        if let Err(err) = self.refresh().await {
            warn!(gemstone = self.gemstone, error = %err, "refetch after mutation failed");
            self.stale = true;
        }
    }
}

fn accepted_start<E>(form: &OwnershipForm, errors: ValidationErrors) -> Result<NaiveDate, SubmitError<E>>
where
    E: std::error::Error + 'static,
{
    match form.start {
        Some(start) if errors.is_empty() => Ok(start),
        _ => {
            debug!(%errors, "ownership form rejected");
            Err(SubmitError::Invalid(errors))
        }
    }
}
