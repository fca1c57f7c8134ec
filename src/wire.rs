//! JSON payloads exchanged with the ownership REST endpoints.
//!
//! Field names follow the API's snake_case columns. Outbound dates are plain `YYYY-MM-DD`;
//! inbound rows may carry full timestamps, which are cut down to the calendar day.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    dates::lenient,
    owner::{OwnershipDraft, OwnershipPatch, OwnershipRecord},
    types::{GemstoneId, OwnershipId},
};

/// Body of `POST` add-ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOwnershipRequest {
    /// Owner's name.
    pub owner_name: String,
    /// Owner's phone number.
    pub owner_phone: String,
    /// Optional email; blank means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    /// Optional postal address; blank means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    /// First day of ownership.
    pub ownership_start_date: NaiveDate,
    /// Always `null` for transfers.
    #[serde(default)]
    pub ownership_end_date: Option<NaiveDate>,
    /// Free-form notes; blank means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Close the current owner at the start date and make this record current.
    pub is_transfer: bool,
}

impl AddOwnershipRequest {
    /// Splits the request into a store draft and the transfer flag.
    pub fn into_draft(self) -> (OwnershipDraft, bool) {
        let end = if self.is_transfer {
            None
        } else {
            self.ownership_end_date
        };
        let draft = OwnershipDraft {
            owner_name: self.owner_name,
            owner_phone: self.owner_phone,
            owner_email: blank_to_none(self.owner_email),
            owner_address: blank_to_none(self.owner_address),
            notes: blank_to_none(self.notes),
            ownership_start_date: self.ownership_start_date,
            ownership_end_date: end,
        };
        (draft, self.is_transfer)
    }
}

/// Body of `PUT` update-ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOwnershipRequest {
    /// Owner's name.
    pub owner_name: String,
    /// Owner's phone number.
    pub owner_phone: String,
    /// Optional email; blank means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    /// Optional postal address; blank means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    /// First day of ownership.
    pub ownership_start_date: NaiveDate,
    /// Day ownership ended; `None` while open.
    #[serde(default)]
    pub ownership_end_date: Option<NaiveDate>,
    /// Free-form notes; blank means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdateOwnershipRequest {
    /// Request that rewrites every field of `record` with its current value.
    pub fn from_record(record: &OwnershipRecord) -> Self {
        Self {
            owner_name: record.owner_name.clone(),
            owner_phone: record.owner_phone.clone(),
            owner_email: record.owner_email.clone(),
            owner_address: record.owner_address.clone(),
            ownership_start_date: record.ownership_start_date,
            ownership_end_date: record.ownership_end_date,
            notes: record.notes.clone(),
        }
    }

    /// Full-replacement patch. The store clears the end date of a current owner.
    pub fn into_patch(self) -> OwnershipPatch {
        OwnershipPatch {
            owner_name: Some(self.owner_name),
            owner_phone: Some(self.owner_phone),
            owner_email: Some(blank_to_none(self.owner_email)),
            owner_address: Some(blank_to_none(self.owner_address)),
            notes: Some(blank_to_none(self.notes)),
            ownership_start_date: Some(self.ownership_start_date),
            ownership_end_date: Some(self.ownership_end_date),
            is_current_owner: None,
        }
    }
}

/// One row of `GET` ownership-history, as the backing store returns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnershipRow {
    /// Record id.
    pub id: OwnershipId,
    /// Gemstone the record belongs to.
    pub gemstone_id: GemstoneId,
    /// Owner's name.
    pub owner_name: String,
    /// Owner's phone number.
    #[serde(default)]
    pub owner_phone: String,
    /// Optional email; blank means none.
    #[serde(default)]
    pub owner_email: Option<String>,
    /// Optional postal address; blank means none.
    #[serde(default)]
    pub owner_address: Option<String>,
    /// Free-form notes; blank means none.
    #[serde(default)]
    pub notes: Option<String>,
    /// First day of ownership.
    #[serde(deserialize_with = "lenient::date")]
    pub ownership_start_date: NaiveDate,
    /// Day ownership ended; `None` while open.
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub ownership_end_date: Option<NaiveDate>,
    /// Open record flag; booleans and 0/1 both parse.
    #[serde(default, deserialize_with = "flag")]
    pub is_current_owner: bool,
}

impl From<OwnershipRow> for OwnershipRecord {
    fn from(row: OwnershipRow) -> Self {
        Self {
            id: row.id,
            gemstone_id: row.gemstone_id,
            owner_name: row.owner_name,
            owner_phone: row.owner_phone,
            owner_email: blank_to_none(row.owner_email),
            owner_address: blank_to_none(row.owner_address),
            notes: blank_to_none(row.notes),
            ownership_start_date: row.ownership_start_date,
            ownership_end_date: row.ownership_end_date,
            is_current_owner: row.is_current_owner,
        }
    }
}

/// Parses a `GET` response body into records, unsorted.
pub fn parse_rows(body: &str) -> Result<Vec<OwnershipRecord>, serde_json::Error> {
    let rows: Vec<OwnershipRow> = serde_json::from_str(body)?;
    Ok(rows.into_iter().map(OwnershipRecord::from).collect())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// MySQL TINYINT columns arrive as 0/1.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}
