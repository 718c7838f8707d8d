//! Entry domain record, draft, and patch types.

use serde::{Deserialize, Serialize};

use crate::types::{EntryId, EntryStatus, RaceId};

/// Fully materialized, authoritative race entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Stable entry identifier.
    pub id: EntryId,
    /// Race to which this entry belongs.
    pub race_id: RaceId,
    /// Racing day label, e.g. `"Sat"`.
    pub day: String,
    /// Division label within the day, e.g. `"Div 2"`.
    pub division: String,
    /// Free-text event descriptor carrying the boat-class code, e.g. `"J16 2-"`.
    pub event: String,
    /// Assigned boat name; blank when no boat has been allocated yet.
    pub boat: String,
    /// Blade-set names, `+`-joined when a compound boat shares sets.
    pub blades: String,
    /// Lifecycle status.
    pub status: EntryStatus,
}

/// Insert payload used to create a new [`EntryRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    /// Race to which this entry belongs.
    pub race_id: RaceId,
    /// Racing day label.
    pub day: String,
    /// Division label within the day.
    pub division: String,
    /// Free-text event descriptor.
    pub event: String,
    /// Assigned boat name; may be blank.
    pub boat: String,
    /// Blade-set names, `+`-joined for compound boats.
    pub blades: String,
    /// Lifecycle status.
    pub status: EntryStatus,
}

/// Sparse patch where each `Some` field overwrites the record value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    /// Optional replacement for race id.
    pub race_id: Option<RaceId>,
    /// Optional replacement for day label.
    pub day: Option<String>,
    /// Optional replacement for division label.
    pub division: Option<String>,
    /// Optional replacement for event descriptor.
    pub event: Option<String>,
    /// Optional replacement for boat name.
    pub boat: Option<String>,
    /// Optional replacement for blade-set names.
    pub blades: Option<String>,
    /// Optional replacement for status.
    pub status: Option<EntryStatus>,
}

impl EntryPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Captures an inverse patch for all fields present in `self`.
    pub fn capture_inverse_for(&self, rec: &EntryRecord) -> Self {
        Self {
            race_id: self.race_id.map(|_| rec.race_id),
            day: self.day.as_ref().map(|_| rec.day.clone()),
            division: self.division.as_ref().map(|_| rec.division.clone()),
            event: self.event.as_ref().map(|_| rec.event.clone()),
            boat: self.boat.as_ref().map(|_| rec.boat.clone()),
            blades: self.blades.as_ref().map(|_| rec.blades.clone()),
            status: self.status.map(|_| rec.status),
        }
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut EntryRecord) {
        if let Some(v) = self.race_id {
            rec.race_id = v;
        }
        if let Some(v) = &self.day {
            rec.day = v.clone();
        }
        if let Some(v) = &self.division {
            rec.division = v.clone();
        }
        if let Some(v) = &self.event {
            rec.event = v.clone();
        }
        if let Some(v) = &self.boat {
            rec.boat = v.clone();
        }
        if let Some(v) = &self.blades {
            rec.blades = v.clone();
        }
        if let Some(v) = self.status {
            rec.status = v;
        }
    }
}
