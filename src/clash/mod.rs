//! Equipment clash detection over a snapshot of race data.
//!
//! Pure and synchronous: every function takes read-only snapshots and
//! returns freshly computed results, with no retained state and no errors.
//! Malformed fields (blank names, missing amounts) degrade to "no conflict
//! contribution" rather than failing; catching bad source documents is the
//! job of upstream validation, not this engine.

/// Event-text classification and crew-size lookup.
pub mod classify;
/// Boat and blade clash detectors.
pub mod detect;
/// Grouping index and entry partitioning.
pub mod grouping;

use serde::{Deserialize, Serialize};

use crate::{
    entry::EntryRecord,
    regatta::{BladeSet, DivisionGroup, SilencedBladeClash, SilencedBoatClash},
    types::{EntryStatus, RaceId},
};

use self::{
    detect::{detect_blade_clashes, detect_boat_clashes},
    grouping::{partition_entries, GroupIndex},
};

/// A boat assigned to two or more entries in one (day, group) bucket.
///
/// Recomputed from scratch on every detection run; identified only by its
/// (day, group, boat) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoatClash {
    /// Racing day label.
    pub day: String,
    /// Resolved group name.
    pub group: String,
    /// Boat name shared by the clashing entries.
    pub boat: String,
    /// Number of entries naming the boat.
    pub count: usize,
    /// True when an exact-match acknowledgment exists.
    pub silenced: bool,
}

/// A blade set whose accumulated oar demand exceeds its inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BladeClash {
    /// Racing day label.
    pub day: String,
    /// Resolved group name.
    pub group: String,
    /// Blade-set name.
    pub blades: String,
    /// Oars demanded within the bucket.
    pub used: u32,
    /// Oars available per the inventory record.
    pub amount: u32,
    /// True when an exact-match acknowledgment exists.
    pub silenced: bool,
}

/// Race-level clash booleans for list views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClashSummary {
    /// Any unsilenced boat clash present.
    pub has_boat_clash: bool,
    /// Any unsilenced blade clash present.
    pub has_blade_clash: bool,
    /// Either of the above.
    pub has_any_clash: bool,
}

/// Computes the race-level clash summary in one pass.
///
/// Builds the grouping index and buckets once and runs both detectors
/// unordered, reporting whether any unsilenced candidate exists per kind.
/// When `race_id` is given, entries and silences belonging to other races
/// are ignored. A race with no `Entered` entry short-circuits to all-false
/// without running the detectors.
pub fn summarize<'a, I>(
    entries: I,
    groups: &[DivisionGroup],
    boat_silences: &[SilencedBoatClash],
    blade_silences: &[SilencedBladeClash],
    blade_sets: &[BladeSet],
    race_id: Option<RaceId>,
) -> ClashSummary
where
    I: IntoIterator<Item = &'a EntryRecord>,
{
    let scoped: Vec<&EntryRecord> = entries
        .into_iter()
        .filter(|e| race_id.is_none_or(|race| e.race_id == race))
        .collect();

    if !scoped.iter().any(|e| e.status == EntryStatus::Entered) {
        return ClashSummary::default();
    }

    let boat_silences: Vec<SilencedBoatClash> = boat_silences
        .iter()
        .filter(|s| race_id.is_none_or(|race| s.race_id == race))
        .cloned()
        .collect();
    let blade_silences: Vec<SilencedBladeClash> = blade_silences
        .iter()
        .filter(|s| race_id.is_none_or(|race| s.race_id == race))
        .cloned()
        .collect();

    let index = GroupIndex::build(groups);
    let buckets = partition_entries(scoped.iter().copied(), &index);

    let has_boat_clash = detect_boat_clashes(&buckets, &boat_silences, None)
        .iter()
        .any(|c| !c.silenced);
    let has_blade_clash = detect_blade_clashes(&buckets, blade_sets, &blade_silences, None)
        .iter()
        .any(|c| !c.silenced);

    ClashSummary {
        has_boat_clash,
        has_blade_clash,
        has_any_clash: has_boat_clash || has_blade_clash,
    }
}
