//! Reference-data records consumed by the clash engine.

use serde::{Deserialize, Serialize};

use crate::types::{BoatClass, RaceId};

/// Declares that a set of divisions on one day race together and share
/// equipment pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionGroup {
    /// Race to which this grouping belongs.
    pub race_id: RaceId,
    /// Racing day label.
    pub day: String,
    /// Group name, e.g. `"Morning"`.
    pub group: String,
    /// Division labels racing together in this group.
    pub divisions: Vec<String>,
}

/// Boat inventory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boat {
    /// Boat name; the race-wide join key used on entries.
    pub name: String,
    /// Boat-class code, when known.
    pub class: Option<BoatClass>,
    /// Whether the boat is currently in service.
    pub active: bool,
}

/// Blade-set inventory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BladeSet {
    /// Blade-set name; the join key used on entries.
    pub name: String,
    /// Individual oars available in this set; `None` means unlimited.
    pub amount: Option<u32>,
    /// Blade length code, e.g. `"370"`.
    pub length_code: String,
}

/// User acknowledgment suppressing one specific boat clash.
///
/// Exact-match only: scoped to the precise (day, group, boat) triple and
/// does not survive a change to any of those fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilencedBoatClash {
    /// Race the acknowledgment belongs to.
    pub race_id: RaceId,
    /// Day of the acknowledged clash.
    pub day: String,
    /// Group of the acknowledged clash.
    pub group: String,
    /// Boat name of the acknowledged clash.
    pub boat: String,
}

/// User acknowledgment suppressing one specific blade clash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilencedBladeClash {
    /// Race the acknowledgment belongs to.
    pub race_id: RaceId,
    /// Day of the acknowledged clash.
    pub day: String,
    /// Group of the acknowledged clash.
    pub group: String,
    /// Blade-set name of the acknowledged clash.
    pub blades: String,
}
