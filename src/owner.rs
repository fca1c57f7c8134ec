//! Ownership record, draft, and patch types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{GemstoneId, OwnershipId};

/// One interval during which a named owner held a gemstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    /// Stable record identifier.
    pub id: OwnershipId,
    /// Gemstone this record belongs to.
    pub gemstone_id: GemstoneId,
    /// Owner display name.
    pub owner_name: String,
    /// Owner phone number.
    pub owner_phone: String,
    /// Owner email address.
    pub owner_email: Option<String>,
    /// Owner postal address.
    pub owner_address: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// First day of the tenure.
    pub ownership_start_date: NaiveDate,
    /// Day the tenure ended; absent while still in effect.
    pub ownership_end_date: Option<NaiveDate>,
    /// Marks the open, most recent interval.
    pub is_current_owner: bool,
}

/// Insert payload used to create a new [`OwnershipRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipDraft {
    /// Owner display name.
    pub owner_name: String,
    /// Owner phone number.
    pub owner_phone: String,
    /// Owner email address.
    pub owner_email: Option<String>,
    /// Owner postal address.
    pub owner_address: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// First day of the tenure.
    pub ownership_start_date: NaiveDate,
    /// Last day of the tenure, if already ended.
    pub ownership_end_date: Option<NaiveDate>,
}

/// Sparse patch where each `Some` field overwrites the record value.
///
/// The optional text fields and the end date are double options: `Some(None)` clears the value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnershipPatch {
    /// Optional replacement for owner name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    /// Optional replacement for owner phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_phone: Option<String>,
    /// Optional replacement for owner email.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub owner_email: Option<Option<String>>,
    /// Optional replacement for owner address.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub owner_address: Option<Option<String>>,
    /// Optional replacement for notes.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub notes: Option<Option<String>>,
    /// Optional replacement for start date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_start_date: Option<NaiveDate>,
    /// Optional replacement for end date.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub ownership_end_date: Option<Option<NaiveDate>>,
    /// Optional replacement for the current-owner flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current_owner: Option<bool>,
}

impl OwnershipPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Patch that only moves the end date.
    pub fn end_date(date: Option<NaiveDate>) -> Self {
        Self {
            ownership_end_date: Some(date),
            ..Self::default()
        }
    }

    /// Patch that only moves the start date.
    pub fn start_date(date: NaiveDate) -> Self {
        Self {
            ownership_start_date: Some(date),
            ..Self::default()
        }
    }

    /// Captures an inverse patch for all fields present in `self`.
    pub fn capture_inverse_for(&self, rec: &OwnershipRecord) -> Self {
        Self {
            owner_name: self.owner_name.as_ref().map(|_| rec.owner_name.clone()),
            owner_phone: self.owner_phone.as_ref().map(|_| rec.owner_phone.clone()),
            owner_email: self.owner_email.as_ref().map(|_| rec.owner_email.clone()),
            owner_address: self.owner_address.as_ref().map(|_| rec.owner_address.clone()),
            notes: self.notes.as_ref().map(|_| rec.notes.clone()),
            ownership_start_date: self.ownership_start_date.map(|_| rec.ownership_start_date),
            ownership_end_date: self.ownership_end_date.map(|_| rec.ownership_end_date),
            is_current_owner: self.is_current_owner.map(|_| rec.is_current_owner),
        }
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut OwnershipRecord) {
        if let Some(v) = &self.owner_name {
            rec.owner_name = v.clone();
        }
        if let Some(v) = &self.owner_phone {
            rec.owner_phone = v.clone();
        }
        if let Some(v) = &self.owner_email {
            rec.owner_email = v.clone();
        }
        if let Some(v) = &self.owner_address {
            rec.owner_address = v.clone();
        }
        if let Some(v) = &self.notes {
            rec.notes = v.clone();
        }
        if let Some(v) = self.ownership_start_date {
            rec.ownership_start_date = v;
        }
        if let Some(v) = self.ownership_end_date {
            rec.ownership_end_date = v;
        }
        if let Some(v) = self.is_current_owner {
            rec.is_current_owner = v;
        }
    }
}

/// Keeps "absent" and "explicit null" apart for `Option<Option<T>>` fields.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
