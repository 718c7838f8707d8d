//! Single-writer command loop, handle, and persistence worker.

use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc, oneshot, Mutex},
    time::{Duration, Instant},
};

use crate::{
    clash::{
        self,
        detect::{detect_blade_clashes, detect_boat_clashes},
        grouping::{partition_entries, GroupIndex},
        BladeClash, BoatClash, ClashSummary,
    },
    core::store::{EntryStore, StoreError},
    entry::{EntryDraft, EntryPatch, EntryRecord},
    op::{Op, StoredOp},
    persist::{OpSink, PersistError},
    regatta::{BladeSet, Boat, DivisionGroup, SilencedBladeClash, SilencedBoatClash},
    types::{EntryId, EntryStatus, OpSeq},
};

use super::events::EntryEvent;

/// Errors surfaced through handle calls.
#[derive(Debug)]
pub enum RuntimeError {
    /// Store-level failure.
    Store(StoreError),
    /// Persistence-level failure.
    Persist(PersistError),
    /// The runtime task is gone.
    ChannelClosed,
}

impl From<StoreError> for RuntimeError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<PersistError> for RuntimeError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

/// Tunables for the runtime loop and persistence worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Flush the journal eagerly after every insert.
    pub flush_on_insert: bool,
    /// Max buffered ops before a forced flush.
    pub batch_max_ops: usize,
    /// Max buffering latency before a timed flush.
    pub batch_max_latency_ms: u64,
    /// Bound of the persistence queue; overflow surfaces as an error.
    pub persist_queue_bound: usize,
    /// Ops between automatic snapshot checkpoints; 0 disables.
    pub snapshot_every_ops: usize,
    /// Compact the journal after each snapshot.
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_insert: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable handle to the single-writer runtime.
pub struct OarLogHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<EntryEvent>,
}

impl Clone for OarLogHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

/// Race reference data owned by the runtime loop.
///
/// Replaced wholesale by the `Set*` commands, mirroring push-based snapshot
/// updates from an external data layer.
#[derive(Debug, Default)]
struct RefData {
    groups: Vec<DivisionGroup>,
    boats: Vec<Boat>,
    blade_sets: Vec<BladeSet>,
    boat_silences: Vec<SilencedBoatClash>,
    blade_silences: Vec<SilencedBladeClash>,
}

enum Command {
    Insert {
        draft: EntryDraft,
        resp: oneshot::Sender<Result<EntryId, RuntimeError>>,
    },
    Patch {
        id: EntryId,
        patch: EntryPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    SetStatus {
        id: EntryId,
        status: EntryStatus,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Undo {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Redo {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Get {
        id: EntryId,
        resp: oneshot::Sender<Option<EntryRecord>>,
    },
    Recent {
        n: usize,
        resp: oneshot::Sender<Vec<EntryRecord>>,
    },
    ByBoat {
        boat: String,
        resp: oneshot::Sender<Vec<EntryRecord>>,
    },
    SetGroups {
        groups: Vec<DivisionGroup>,
        resp: oneshot::Sender<()>,
    },
    SetBoats {
        boats: Vec<Boat>,
        resp: oneshot::Sender<()>,
    },
    Boats {
        resp: oneshot::Sender<Vec<Boat>>,
    },
    SetBladeSets {
        blade_sets: Vec<BladeSet>,
        resp: oneshot::Sender<()>,
    },
    SetBoatSilences {
        silences: Vec<SilencedBoatClash>,
        resp: oneshot::Sender<()>,
    },
    SetBladeSilences {
        silences: Vec<SilencedBladeClash>,
        resp: oneshot::Sender<()>,
    },
    Clashes {
        day_order: Option<Vec<String>>,
        resp: oneshot::Sender<(Vec<BoatClash>, Vec<BladeClash>)>,
    },
    Summary {
        resp: oneshot::Sender<ClashSummary>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: crate::core::store::StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the single-writer runtime over `store`, with an optional journal
/// sink, and returns its handle.
pub fn spawn_oarlog(
    store: EntryStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> OarLogHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<EntryEvent>(1024);

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound);
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut store = store;
        let mut refdata = RefData::default();
        let mut ops_since_snapshot = 0usize;

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        let done = handle_command(
                            cmd,
                            &mut store,
                            &mut refdata,
                            &events_tx_loop,
                            persist_tx_opt.as_ref(),
                            &config,
                            &mut ops_since_snapshot,
                        ).await;

                        if done {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        if let Some(Ok(op_seq)) = durable {
                            let _ = events_tx_loop.send(EntryEvent::DurableUpTo { op_seq });
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                let done = handle_command(
                    cmd,
                    &mut store,
                    &mut refdata,
                    &events_tx_loop,
                    persist_tx_opt.as_ref(),
                    &config,
                    &mut ops_since_snapshot,
                ).await;
                if done {
                    break;
                }
            }
        }
    });

    OarLogHandle { cmd_tx, events_tx }
}

impl OarLogHandle {
    /// Subscribes to the runtime event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
        self.events_tx.subscribe()
    }

    /// Inserts a new entry.
    pub async fn insert(&self, draft: EntryDraft) -> Result<EntryId, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Insert { draft, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Applies a sparse patch to an entry.
    pub async fn patch(&self, id: EntryId, patch: EntryPatch) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Patch { id, patch, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Transitions an entry's lifecycle status.
    pub async fn set_status(&self, id: EntryId, status: EntryStatus) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetStatus { id, status, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Reverts the most recent mutation.
    pub async fn undo(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Undo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Re-applies the most recently undone mutation.
    pub async fn redo(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Redo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Fetches an entry by id.
    pub async fn get(&self, id: EntryId) -> Result<Option<EntryRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Get { id, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Fetches the most recently inserted `n` entries.
    pub async fn recent(&self, n: usize) -> Result<Vec<EntryRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Recent { n, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Fetches entries assigned to the named boat.
    pub async fn by_boat(&self, boat: impl Into<String>) -> Result<Vec<EntryRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ByBoat {
                boat: boat.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replaces the division groupings.
    pub async fn set_groups(&self, groups: Vec<DivisionGroup>) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetGroups { groups, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replaces the boat inventory.
    pub async fn set_boats(&self, boats: Vec<Boat>) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetBoats { boats, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Fetches the boat inventory.
    pub async fn boats(&self) -> Result<Vec<Boat>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Boats { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replaces the blade-set inventory.
    pub async fn set_blade_sets(&self, blade_sets: Vec<BladeSet>) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetBladeSets {
                blade_sets,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replaces the boat-clash acknowledgments.
    pub async fn set_boat_silences(
        &self,
        silences: Vec<SilencedBoatClash>,
    ) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetBoatSilences { silences, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replaces the blade-clash acknowledgments.
    pub async fn set_blade_silences(
        &self,
        silences: Vec<SilencedBladeClash>,
    ) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetBladeSilences { silences, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Runs both clash detectors over the current snapshot.
    pub async fn clashes(
        &self,
        day_order: Option<Vec<String>>,
    ) -> Result<(Vec<BoatClash>, Vec<BladeClash>), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Clashes { day_order, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Computes the race-level clash summary.
    pub async fn clash_summary(&self) -> Result<ClashSummary, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Summary { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Forces a journal flush and returns the durable watermark.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Writes a snapshot checkpoint.
    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Checkpoint { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Flushes and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    store: &mut EntryStore,
    refdata: &mut RefData,
    events_tx: &broadcast::Sender<EntryEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
    ops_since_snapshot: &mut usize,
) -> bool {
    match cmd {
        Command::Insert { draft, resp } => {
            let res = store
                .insert(draft)
                .map_err(RuntimeError::from)
                .and_then(|(id, stored)| {
                    let out = id;
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(EntryEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(EntryEvent::Inserted { id });
                    Ok(out)
                });
            if res.is_ok() {
                *ops_since_snapshot += 1;
                maybe_auto_checkpoint(store, persist_tx, config, ops_since_snapshot).await;
            }
            let _ = resp.send(res);
        }
        Command::Patch { id, patch, resp } => {
            let res = store
                .patch(id, patch)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(EntryEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(EntryEvent::Updated { id });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::SetStatus { id, status, resp } => {
            let res = store
                .set_status(id, status)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(EntryEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(EntryEvent::StatusChanged { id, status });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::Undo { resp } => {
            let res = store
                .undo()
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(EntryEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(EntryEvent::UndoApplied);
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::Redo { resp } => {
            let res = store
                .redo()
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(EntryEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(EntryEvent::RedoApplied);
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::Get { id, resp } => {
            let _ = resp.send(store.get_cloned(id));
        }
        Command::Recent { n, resp } => {
            let _ = resp.send(store.recent_cloned(n));
        }
        Command::ByBoat { boat, resp } => {
            let _ = resp.send(store.by_boat_cloned(&boat));
        }
        Command::SetGroups { groups, resp } => {
            refdata.groups = groups;
            let _ = events_tx.send(EntryEvent::ReferenceUpdated);
            let _ = resp.send(());
        }
        Command::SetBoats { boats, resp } => {
            refdata.boats = boats;
            let _ = events_tx.send(EntryEvent::ReferenceUpdated);
            let _ = resp.send(());
        }
        Command::Boats { resp } => {
            let _ = resp.send(refdata.boats.clone());
        }
        Command::SetBladeSets { blade_sets, resp } => {
            refdata.blade_sets = blade_sets;
            let _ = events_tx.send(EntryEvent::ReferenceUpdated);
            let _ = resp.send(());
        }
        Command::SetBoatSilences { silences, resp } => {
            refdata.boat_silences = silences;
            let _ = events_tx.send(EntryEvent::ReferenceUpdated);
            let _ = resp.send(());
        }
        Command::SetBladeSilences { silences, resp } => {
            refdata.blade_silences = silences;
            let _ = events_tx.send(EntryEvent::ReferenceUpdated);
            let _ = resp.send(());
        }
        Command::Clashes { day_order, resp } => {
            let index = GroupIndex::build(&refdata.groups);
            let records = store.ordered_records();
            let buckets = partition_entries(records.iter().copied(), &index);
            let boats =
                detect_boat_clashes(&buckets, &refdata.boat_silences, day_order.as_deref());
            let blades = detect_blade_clashes(
                &buckets,
                &refdata.blade_sets,
                &refdata.blade_silences,
                day_order.as_deref(),
            );
            let _ = resp.send((boats, blades));
        }
        Command::Summary { resp } => {
            let records = store.ordered_records();
            let summary = clash::summarize(
                records.iter().copied(),
                &refdata.groups,
                &refdata.boat_silences,
                &refdata.blade_silences,
                &refdata.blade_sets,
                None,
            );
            let _ = resp.send(summary);
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx
                    .send(PersistMsg::Flush { resp: flush_tx })
                    .await
                    .is_err()
                {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Checkpoint { resp } => {
            let out = if let Some(tx) = persist_tx {
                let snapshot = store.export_snapshot();
                let last_seq = store.latest_op_seq();
                let (cp_tx, cp_rx) = oneshot::channel();
                if tx
                    .send(PersistMsg::Checkpoint {
                        snapshot,
                        last_seq,
                        compact: config.compact_after_snapshot,
                        resp: cp_tx,
                    })
                    .await
                    .is_err()
                {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    cp_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                let send_res = tx.send(PersistMsg::Shutdown { resp: done_tx }).await;
                if send_res.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    match done_rx.await {
                        Ok(()) => Ok(()),
                        Err(_) => Err(RuntimeError::ChannelClosed),
                    }
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredOp>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            let is_insert = matches!(stored.op, Op::Insert { .. });
                            buf.push(stored);

                            if buf.len() >= config.batch_max_ops || (config.flush_on_insert && is_insert) {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let flush_result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let result = if let Err(err) = flush_result {
                                Err(err)
                            } else {
                                let sink_ref = Arc::clone(&sink);
                                match tokio::task::spawn_blocking(move || {
                                    let mut sink = sink_ref.blocking_lock();
                                    sink.write_snapshot(&snapshot, last_seq)?;
                                    if compact {
                                        let _ = sink.compact_through(last_seq)?;
                                    }
                                    Result::<(), PersistError>::Ok(())
                                }).await {
                                    Ok(inner) => inner,
                                    Err(e) => Err(PersistError::Message(format!("join error: {e}"))),
                                }
                            };
                            let _ = resp.send(result);
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn OpSink>>>,
    buf: &mut Vec<StoredOp>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let ops = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let append_res: Result<OpSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_ops(&ops)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(PersistError::Message(format!("append failed: {err:?}"))));
            Err(err)
        }
    }
}

async fn maybe_auto_checkpoint(
    store: &EntryStore,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
    ops_since_snapshot: &mut usize,
) {
    if config.snapshot_every_ops == 0 || *ops_since_snapshot < config.snapshot_every_ops {
        return;
    }

    let Some(tx) = persist_tx else {
        return;
    };

    let snapshot = store.export_snapshot();
    let last_seq = store.latest_op_seq();
    let (cp_tx, cp_rx) = oneshot::channel();
    if tx
        .send(PersistMsg::Checkpoint {
            snapshot,
            last_seq,
            compact: config.compact_after_snapshot,
            resp: cp_tx,
        })
        .await
        .is_ok()
    {
        let _ = cp_rx.await;
        *ops_since_snapshot = 0;
    }
}

fn enqueue_persist(tx: &mpsc::Sender<PersistMsg>, stored: StoredOp) -> Result<(), RuntimeError> {
    tx.try_send(PersistMsg::Op(stored))
        .map_err(|err| RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}"))))
}
