use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use oarlog::{
    clash::{
        detect::{detect_blade_clashes, detect_boat_clashes},
        grouping::{partition_entries, GroupIndex},
    },
    core::store::{EntryStore, StoreError},
    entry::{EntryDraft, EntryPatch, EntryRecord},
    regatta::{BladeSet, DivisionGroup},
    types::{EntryId, EntryStatus},
};

const DAYS: [&str; 3] = ["Sat", "Sun", "Mon"];
const DIVISIONS: [&str; 4] = ["Div 1", "Div 2", "Div 3", "Div 4"];
const BOATS: [&str; 4] = ["Alpha", "Beta", "Gamma", ""];
const EVENTS: [&str; 5] = ["Novice 8+", "J16 2-", "Op 4x", "W 1x", "Head Race"];
const BLADES: [&str; 4] = ["SetA", "SetB", "SetA + SetB", ""];
const STATUSES: [EntryStatus; 5] = [
    EntryStatus::InProgress,
    EntryStatus::Ready,
    EntryStatus::Entered,
    EntryStatus::Withdrawn,
    EntryStatus::Rejected,
];

#[derive(Debug, Clone)]
enum Action {
    Insert { div_idx: u8, boat_idx: u8 },
    PatchBoat { target: u8, boat_idx: u8 },
    PatchDay { target: u8, day_idx: u8 },
    SetStatus { target: u8, status_idx: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..4, 0u8..4).prop_map(|(div_idx, boat_idx)| Action::Insert { div_idx, boat_idx }),
        (0u8..24, 0u8..4).prop_map(|(target, boat_idx)| Action::PatchBoat { target, boat_idx }),
        (0u8..24, 0u8..3).prop_map(|(target, day_idx)| Action::PatchDay { target, day_idx }),
        (0u8..24, 0u8..5).prop_map(|(target, status_idx)| Action::SetStatus { target, status_idx }),
    ]
}

fn draft_from(div_idx: u8, boat_idx: u8) -> EntryDraft {
    EntryDraft {
        race_id: 1,
        day: "Sat".to_string(),
        division: DIVISIONS[usize::from(div_idx) % DIVISIONS.len()].to_string(),
        event: "J16 2-".to_string(),
        boat: BOATS[usize::from(boat_idx) % BOATS.len()].to_string(),
        blades: "SetA".to_string(),
        status: EntryStatus::Entered,
    }
}

fn all_ids(store: &EntryStore) -> Vec<EntryId> {
    store.ordered_ids().to_vec()
}

fn full_scan_by_boat(store: &EntryStore, boat: &str) -> Vec<EntryId> {
    let mut ids: Vec<EntryId> = store
        .ordered_ids()
        .iter()
        .copied()
        .filter(|id| store.get(*id).is_some_and(|r| r.boat == boat))
        .collect();
    ids.sort_unstable();
    ids
}

fn by_boat_ids(store: &EntryStore, boat: &str) -> Vec<EntryId> {
    // Reindexing on patch appends, so index order can differ from insertion
    // order; membership is the invariant under test.
    let mut ids: Vec<EntryId> = store.by_boat(boat).into_iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids
}

fn snapshot_records(store: &EntryStore) -> Vec<EntryRecord> {
    store
        .ordered_ids()
        .iter()
        .filter_map(|id| store.get(*id).cloned())
        .collect()
}

proptest! {
    #[test]
    fn random_sequences_preserve_indices_and_undo_redo_roundtrip(actions in prop::collection::vec(action_strategy(), 1..200)) {
        let mut store = EntryStore::new();
        let mut boats = BTreeSet::<String>::new();

        for action in actions {
            match action {
                Action::Insert { div_idx, boat_idx } => {
                    boats.insert(BOATS[usize::from(boat_idx) % BOATS.len()].to_string());
                    let _ = store.insert(draft_from(div_idx, boat_idx));
                }
                Action::PatchBoat { target, boat_idx } => {
                    let ids = all_ids(&store);
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    let boat = BOATS[usize::from(boat_idx) % BOATS.len()].to_string();
                    boats.insert(boat.clone());
                    let _ = store.patch(
                        id,
                        EntryPatch {
                            boat: Some(boat),
                            ..EntryPatch::default()
                        },
                    );
                }
                Action::PatchDay { target, day_idx } => {
                    let ids = all_ids(&store);
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    let _ = store.patch(
                        id,
                        EntryPatch {
                            day: Some(DAYS[usize::from(day_idx) % DAYS.len()].to_string()),
                            ..EntryPatch::default()
                        },
                    );
                }
                Action::SetStatus { target, status_idx } => {
                    let ids = all_ids(&store);
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    let _ = store.set_status(id, STATUSES[usize::from(status_idx) % STATUSES.len()]);
                }
            }

            for boat in &boats {
                prop_assert_eq!(by_boat_ids(&store, boat), full_scan_by_boat(&store, boat));
            }
        }

        let target = snapshot_records(&store);
        loop {
            match store.undo() {
                Ok(_) => {},
                Err(StoreError::NothingToUndo) => break,
                Err(other) => prop_assert!(false, "unexpected undo error: {other:?}"),
            }
        }

        loop {
            match store.redo() {
                Ok(_) => {},
                Err(StoreError::NothingToRedo) => break,
                Err(other) => prop_assert!(false, "unexpected redo error: {other:?}"),
            }
        }

        prop_assert_eq!(snapshot_records(&store), target);
    }
}

fn entries_from_seeds(seeds: &[(u8, u8, u8, u8, u8, u8)]) -> Vec<EntryRecord> {
    seeds
        .iter()
        .enumerate()
        .map(|(idx, &(day, div, event, boat, blades, status))| EntryRecord {
            id: idx as EntryId + 1,
            race_id: 1,
            day: DAYS[usize::from(day) % DAYS.len()].to_string(),
            division: DIVISIONS[usize::from(div) % DIVISIONS.len()].to_string(),
            event: EVENTS[usize::from(event) % EVENTS.len()].to_string(),
            boat: BOATS[usize::from(boat) % BOATS.len()].to_string(),
            blades: BLADES[usize::from(blades) % BLADES.len()].to_string(),
            status: STATUSES[usize::from(status) % STATUSES.len()],
        })
        .collect()
}

fn groups_from_seeds(seeds: &[(u8, u8, u8)]) -> Vec<DivisionGroup> {
    seeds
        .iter()
        .map(|&(day, name, mask)| DivisionGroup {
            race_id: 1,
            day: DAYS[usize::from(day) % DAYS.len()].to_string(),
            group: ["AM", "PM"][usize::from(name) % 2].to_string(),
            divisions: DIVISIONS
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, d)| d.to_string())
                .collect(),
        })
        .collect()
}

fn inventory() -> Vec<BladeSet> {
    vec![
        BladeSet {
            name: "SetA".to_string(),
            amount: Some(4),
            length_code: "370".to_string(),
        },
        BladeSet {
            name: "SetB".to_string(),
            amount: None,
            length_code: "372".to_string(),
        },
    ]
}

proptest! {
    #[test]
    fn detectors_are_deterministic_and_count_exactly(
        entry_seeds in prop::collection::vec((0u8..3, 0u8..4, 0u8..5, 0u8..4, 0u8..4, 0u8..5), 0..40),
        group_seeds in prop::collection::vec((0u8..3, 0u8..2, 0u8..16u8), 0..4),
    ) {
        let entries = entries_from_seeds(&entry_seeds);
        let groups = groups_from_seeds(&group_seeds);
        let blade_sets = inventory();
        let day_order: Vec<String> = DAYS.iter().map(|d| d.to_string()).collect();

        let run = || {
            let index = GroupIndex::build(&groups);
            let buckets = partition_entries(&entries, &index);
            (
                detect_boat_clashes(&buckets, &[], Some(&day_order)),
                detect_blade_clashes(&buckets, &blade_sets, &[], Some(&day_order)),
            )
        };

        // Idempotence, order included.
        let (boats_a, blades_a) = run();
        let (boats_b, blades_b) = run();
        prop_assert_eq!(&boats_a, &boats_b);
        prop_assert_eq!(&blades_a, &blades_b);

        // Boat clashes match an independent count of entered entries.
        let index = GroupIndex::build(&groups);
        let mut expected: BTreeMap<(String, String, String), usize> = BTreeMap::new();
        for entry in &entries {
            if entry.status != EntryStatus::Entered {
                continue;
            }
            let boat = entry.boat.trim();
            if boat.is_empty() {
                continue;
            }
            let group = index.resolve(&entry.day, &entry.division).to_string();
            *expected
                .entry((entry.day.clone(), group, boat.to_string()))
                .or_insert(0) += 1;
        }
        expected.retain(|_, count| *count >= 2);

        let reported: BTreeMap<(String, String, String), usize> = boats_a
            .iter()
            .map(|c| ((c.day.clone(), c.group.clone(), c.boat.clone()), c.count))
            .collect();
        prop_assert_eq!(reported, expected);

        // Entries outside `Entered` status contribute nothing.
        let entered_only: Vec<EntryRecord> = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Entered)
            .cloned()
            .collect();
        let index = GroupIndex::build(&groups);
        let buckets = partition_entries(&entered_only, &index);
        let boats_filtered = detect_boat_clashes(&buckets, &[], Some(&day_order));
        let blades_filtered = detect_blade_clashes(&buckets, &blade_sets, &[], Some(&day_order));
        prop_assert_eq!(boats_a, boats_filtered);
        prop_assert_eq!(blades_a, blades_filtered);
    }
}
