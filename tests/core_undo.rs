use oarlog::{
    core::store::EntryStore,
    entry::{EntryDraft, EntryPatch},
    types::EntryStatus,
};

fn draft(division: &str, boat: &str) -> EntryDraft {
    EntryDraft {
        race_id: 1,
        day: "Sat".to_string(),
        division: division.to_string(),
        event: "J16 2-".to_string(),
        boat: boat.to_string(),
        blades: "SetX".to_string(),
        status: EntryStatus::Entered,
    }
}

#[test]
fn insert_yields_monotonic_ids() {
    let mut store = EntryStore::new();
    let (id1, op1) = store.insert(draft("Div 1", "Eight A")).unwrap();
    let (id2, op2) = store.insert(draft("Div 2", "Eight B")).unwrap();
    let (id3, op3) = store.insert(draft("Div 3", "Eight C")).unwrap();

    assert_eq!((id1, id2, id3), (1, 2, 3));
    assert_eq!((op1.seq, op2.seq, op3.seq), (1, 2, 3));
}

#[test]
fn patch_undo_redo_restores_exact_state() {
    let mut store = EntryStore::new();
    let (id, _) = store.insert(draft("Div 1", "Eight A")).unwrap();

    let before = store.get(id).unwrap().clone();

    let patch = EntryPatch {
        boat: Some("Eight B".to_string()),
        blades: Some("SetY".to_string()),
        event: Some("J16 4x".to_string()),
        ..EntryPatch::default()
    };

    store.patch(id, patch).unwrap();
    let after_patch = store.get(id).unwrap().clone();
    assert_ne!(after_patch, before);

    store.undo().unwrap();
    let after_undo = store.get(id).unwrap().clone();
    assert_eq!(after_undo, before);

    store.redo().unwrap();
    let after_redo = store.get(id).unwrap().clone();
    assert_eq!(after_redo, after_patch);
}

#[test]
fn set_status_undo_restores_previous_status() {
    let mut store = EntryStore::new();
    let (id, _) = store.insert(draft("Div 1", "Eight A")).unwrap();

    store.set_status(id, EntryStatus::Withdrawn).unwrap();
    assert_eq!(store.get(id).unwrap().status, EntryStatus::Withdrawn);

    store.undo().unwrap();
    assert_eq!(store.get(id).unwrap().status, EntryStatus::Entered);

    store.redo().unwrap();
    assert_eq!(store.get(id).unwrap().status, EntryStatus::Withdrawn);
}

#[test]
fn undoing_an_insert_withdraws_the_entry() {
    let mut store = EntryStore::new();
    let (id, _) = store.insert(draft("Div 1", "Eight A")).unwrap();

    store.undo().unwrap();
    let rec = store.get(id).expect("record still present");
    assert_eq!(rec.status, EntryStatus::Withdrawn);

    store.redo().unwrap();
    assert_eq!(store.get(id).unwrap().status, EntryStatus::Entered);
}

#[test]
fn boat_index_follows_patches() {
    let mut store = EntryStore::new();
    let (id, _) = store.insert(draft("Div 1", "Eight A")).unwrap();

    assert_eq!(store.by_boat("Eight A").len(), 1);

    store
        .patch(
            id,
            EntryPatch {
                boat: Some("Eight B".to_string()),
                ..EntryPatch::default()
            },
        )
        .unwrap();

    assert!(store.by_boat("Eight A").is_empty());
    assert_eq!(store.by_boat("Eight B").len(), 1);
    assert_eq!(store.on_day("Sat").len(), 1);
}
