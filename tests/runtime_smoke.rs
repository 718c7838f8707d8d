use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use oarlog::{
    core::store::EntryStore,
    entry::{EntryDraft, EntryPatch},
    persist::OpSink,
    regatta::{BladeSet, Boat, SilencedBoatClash},
    runtime::{
        events::EntryEvent,
        handle::{spawn_oarlog, RuntimeConfig, RuntimeError},
    },
    types::{EntryStatus, OpSeq},
};

fn draft(division: &str, boat: &str, blades: &str) -> EntryDraft {
    EntryDraft {
        race_id: 1,
        day: "Sat".to_string(),
        division: division.to_string(),
        event: "J16 2-".to_string(),
        boat: boat.to_string(),
        blades: blades.to_string(),
        status: EntryStatus::Entered,
    }
}

struct SlowSink {
    seen: Arc<Mutex<Vec<OpSeq>>>,
    delay: Duration,
}

impl OpSink for SlowSink {
    fn append_ops(&mut self, ops: &[oarlog::op::StoredOp]) -> oarlog::persist::PersistResult<OpSeq> {
        std::thread::sleep(self.delay);
        let mut seen = self.seen.lock().expect("lock");
        for op in ops {
            seen.push(op.seq);
        }
        Ok(ops.last().map(|o| o.seq).unwrap_or(0))
    }
}

#[tokio::test]
async fn runtime_insert_patch_query_and_events_ordered() {
    let handle = spawn_oarlog(EntryStore::new(), None, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let id = handle.insert(draft("Div 1", "Eight A", "SetX")).await.expect("insert");
    handle
        .patch(
            id,
            EntryPatch {
                boat: Some("Eight B".to_string()),
                ..EntryPatch::default()
            },
        )
        .await
        .expect("patch");

    let rec = handle.get(id).await.expect("get").expect("record");
    assert_eq!(rec.boat, "Eight B");

    let mut seen = Vec::new();
    for _ in 0..6 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if !matches!(evt, EntryEvent::DurableUpTo { .. }) {
            seen.push(evt);
        }
        if seen.len() == 2 {
            break;
        }
    }

    assert_eq!(seen[0], EntryEvent::Inserted { id });
    assert_eq!(seen[1], EntryEvent::Updated { id });

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn clash_queries_follow_the_live_snapshot() {
    let handle = spawn_oarlog(EntryStore::new(), None, RuntimeConfig::default());

    handle.insert(draft("J16", "Eight A", "SetX")).await.expect("insert 1");
    handle.insert(draft("J16", "Eight A", "SetX")).await.expect("insert 2");
    handle
        .set_blade_sets(vec![BladeSet {
            name: "SetX".to_string(),
            amount: Some(2),
            length_code: "370".to_string(),
        }])
        .await
        .expect("set blades");
    handle
        .set_boats(vec![Boat {
            name: "Eight A".to_string(),
            class: None,
            active: true,
        }])
        .await
        .expect("set boats");

    let boats_inventory = handle.boats().await.expect("boats");
    assert_eq!(boats_inventory.len(), 1);
    assert_eq!(boats_inventory[0].name, "Eight A");

    let (boats, blades) = handle.clashes(None).await.expect("clashes");
    assert_eq!(boats.len(), 1);
    assert_eq!(boats[0].boat, "Eight A");
    assert_eq!(boats[0].count, 2);
    assert_eq!(blades.len(), 1);
    assert_eq!(blades[0].blades, "SetX");
    assert_eq!(blades[0].used, 4);
    assert_eq!(blades[0].amount, 2);

    let summary = handle.clash_summary().await.expect("summary");
    assert!(summary.has_boat_clash);
    assert!(summary.has_blade_clash);
    assert!(summary.has_any_clash);

    // Acknowledging the boat clash hides it from the summary but the
    // detector keeps reporting it, tagged.
    handle
        .set_boat_silences(vec![SilencedBoatClash {
            race_id: 1,
            day: "Sat".to_string(),
            group: "J16".to_string(),
            boat: "Eight A".to_string(),
        }])
        .await
        .expect("silence");

    let summary = handle.clash_summary().await.expect("summary");
    assert!(!summary.has_boat_clash);
    assert!(summary.has_blade_clash);

    let (boats, _) = handle.clashes(None).await.expect("clashes");
    assert_eq!(boats.len(), 1);
    assert!(boats[0].silenced);

    // Withdrawing one crew clears the boat clash entirely.
    handle.set_status(1, EntryStatus::Withdrawn).await.expect("withdraw");
    let (boats, blades) = handle.clashes(None).await.expect("clashes");
    assert!(boats.is_empty());
    assert!(blades.is_empty());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn durable_event_advances_and_slow_sink_surfaces_queue_pressure() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = SlowSink {
        seen: Arc::clone(&seen),
        delay: Duration::from_millis(250),
    };

    let cfg = RuntimeConfig {
        flush_on_insert: true,
        batch_max_ops: 16,
        batch_max_latency_ms: 500,
        persist_queue_bound: 1,
        snapshot_every_ops: 0,
        compact_after_snapshot: false,
    };

    let handle = spawn_oarlog(EntryStore::new(), Some(Box::new(sink)), cfg);
    let mut sub = handle.subscribe();

    let id = handle.insert(draft("Div 1", "Eight A", "SetX")).await.expect("insert");
    assert_eq!(id, 1);

    let mut durable_seen = false;
    for _ in 0..5 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timeout")
            .expect("recv");
        if matches!(evt, EntryEvent::DurableUpTo { .. }) {
            durable_seen = true;
            break;
        }
    }
    assert!(durable_seen, "expected DurableUpTo event");

    let mut queue_error_seen = false;
    for i in 0..12u64 {
        let r = handle.insert(draft(&format!("Div {i}"), "Eight B", "SetY")).await;
        if let Err(RuntimeError::Persist(_)) = r {
            queue_error_seen = true;
            break;
        }
    }
    assert!(queue_error_seen, "expected persistence queue pressure to surface as error");

    handle.shutdown().await.expect("shutdown");
    assert!(!seen.lock().expect("lock").is_empty());
}
