use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use oarlog::{
    clash::{
        detect::{detect_blade_clashes, detect_boat_clashes},
        grouping::{partition_entries, GroupIndex},
    },
    core::store::EntryStore,
    entry::{EntryDraft, EntryPatch},
    regatta::{BladeSet, DivisionGroup},
    types::EntryStatus,
};

fn draft(i: u64) -> EntryDraft {
    EntryDraft {
        race_id: 1,
        day: ["Sat", "Sun"][(i % 2) as usize].to_string(),
        division: format!("Div {}", i % 8),
        event: ["Novice 8+", "J16 2-", "Op 4x"][(i % 3) as usize].to_string(),
        boat: format!("Boat {}", i % 40),
        blades: format!("Set {}", i % 12),
        status: EntryStatus::Entered,
    }
}

fn bench_inserts(c: &mut Criterion) {
    c.bench_function("store_insert_50k", |b| {
        b.iter(|| {
            let mut store = EntryStore::new();
            for i in 0..50_000u64 {
                let _ = store.insert(draft(i)).expect("insert");
            }
        });
    });
}

fn bench_random_patches(c: &mut Criterion) {
    c.bench_function("store_patch_10k", |b| {
        b.iter(|| {
            let mut store = EntryStore::new();
            for i in 0..10_000u64 {
                let _ = store.insert(draft(i)).expect("insert");
            }
            for i in 0..10_000u64 {
                let _ = store
                    .patch(
                        i + 1,
                        EntryPatch {
                            boat: Some(format!("Boat {}", (i + 7) % 40)),
                            ..EntryPatch::default()
                        },
                    )
                    .expect("patch");
            }
        });
    });
}

fn bench_clash_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("clash_detection");

    let groups: Vec<DivisionGroup> = (0..2)
        .map(|g| DivisionGroup {
            race_id: 1,
            day: ["Sat", "Sun"][g].to_string(),
            group: "All day".to_string(),
            divisions: (0..8).map(|d| format!("Div {d}")).collect(),
        })
        .collect();
    let blade_sets: Vec<BladeSet> = (0..12)
        .map(|i| BladeSet {
            name: format!("Set {i}"),
            amount: Some(16),
            length_code: "370".to_string(),
        })
        .collect();
    let day_order = vec!["Sat".to_string(), "Sun".to_string()];

    for n in [100u64, 1000u64, 5000u64] {
        let mut store = EntryStore::new();
        for i in 0..n {
            let _ = store.insert(draft(i)).expect("insert");
        }

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let index = GroupIndex::build(&groups);
                let records = store.ordered_records();
                let buckets = partition_entries(records.iter().copied(), &index);
                let boats = detect_boat_clashes(&buckets, &[], Some(&day_order));
                let blades = detect_blade_clashes(&buckets, &blade_sets, &[], Some(&day_order));
                (boats.len(), blades.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_inserts, bench_random_patches, bench_clash_detection);
criterion_main!(benches);
