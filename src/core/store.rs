//! Authoritative in-memory entry store with invertible ops and undo/redo.

use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    core::indices::VecIndex,
    entry::{EntryDraft, EntryPatch, EntryRecord},
    op::{Op, StoredOp},
    types::{EntryId, EntryStatus, OpSeq},
};

/// Errors surfaced by store mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The entry id does not exist.
    MissingEntry(EntryId),
    /// The entry id is already present.
    AlreadyExists(EntryId),
    /// The undo stack is empty.
    NothingToUndo,
    /// The redo stack is empty.
    NothingToRedo,
}

/// Serializable full-store state for checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next entry id to assign.
    pub next_entry_id: EntryId,
    /// Next operation sequence to assign.
    pub next_op_seq: OpSeq,
    /// Entry ids in insertion order.
    pub order: Vec<EntryId>,
    /// Records in insertion order.
    pub records: Vec<EntryRecord>,
}

/// Authoritative in-memory entry store.
#[derive(Debug, Default)]
pub struct EntryStore {
    records: HashMap<EntryId, EntryRecord>,
    order: Vec<EntryId>,
    pos: HashMap<EntryId, usize>,
    by_boat: VecIndex<String>,
    by_day: VecIndex<String>,
    undo: Vec<Op>,
    redo: Vec<Op>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
    next_entry_id: EntryId,
}

impl EntryStore {
    /// Creates an empty store with id and sequence counters at 1.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            next_entry_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from an exported snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_entry_id: snapshot.next_entry_id,
            next_op_seq: snapshot.next_op_seq,
            order: snapshot.order,
            ..Self::default()
        };

        for (idx, id) in store.order.iter().copied().enumerate() {
            store.pos.insert(id, idx);
        }

        for rec in snapshot.records {
            store.insert_indices(&rec);
            store.records.insert(rec.id, rec);
        }

        Ok(store)
    }

    /// Exports the full state in insertion order.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        let records = self
            .order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();

        StoreSnapshotV1 {
            next_entry_id: self.next_entry_id,
            next_op_seq: self.next_op_seq,
            order: self.order.clone(),
            records,
        }
    }

    /// Inserts a new entry, returning its id and the journaled op.
    pub fn insert(&mut self, draft: EntryDraft) -> Result<(EntryId, StoredOp), StoreError> {
        let id = self.next_entry_id;
        self.next_entry_id += 1;

        let entry = EntryRecord {
            id,
            race_id: draft.race_id,
            day: draft.day,
            division: draft.division,
            event: draft.event,
            boat: draft.boat,
            blades: draft.blades,
            status: draft.status,
        };

        let (stored, inverse) = self.apply_insert(entry)?;
        self.undo.push(inverse);
        self.redo.clear();
        self.pending_ops.push(stored.clone());
        Ok((id, stored))
    }

    /// Applies a sparse patch to an existing entry.
    pub fn patch(&mut self, id: EntryId, patch: EntryPatch) -> Result<((), StoredOp), StoreError> {
        let (stored, inverse) = self.apply_patch(id, patch)?;
        self.undo.push(inverse);
        self.redo.clear();
        self.pending_ops.push(stored.clone());
        Ok(((), stored))
    }

    /// Transitions an entry's lifecycle status.
    pub fn set_status(
        &mut self,
        id: EntryId,
        status: EntryStatus,
    ) -> Result<((), StoredOp), StoreError> {
        let prev_status = self
            .records
            .get(&id)
            .ok_or(StoreError::MissingEntry(id))?
            .status;
        let (stored, inverse) = self.apply_set_status(id, status, prev_status)?;
        self.undo.push(inverse);
        self.redo.clear();
        self.pending_ops.push(stored.clone());
        Ok(((), stored))
    }

    /// Reverts the most recent mutation.
    pub fn undo(&mut self) -> Result<((), StoredOp), StoreError> {
        let op = self.undo.pop().ok_or(StoreError::NothingToUndo)?;
        let (stored, inverse) = self.apply_op(op)?;
        self.redo.push(inverse);
        self.pending_ops.push(stored.clone());
        Ok(((), stored))
    }

    /// Re-applies the most recently undone mutation.
    pub fn redo(&mut self) -> Result<((), StoredOp), StoreError> {
        let op = self.redo.pop().ok_or(StoreError::NothingToRedo)?;
        let (stored, inverse) = self.apply_op(op)?;
        self.undo.push(inverse);
        self.pending_ops.push(stored.clone());
        Ok(((), stored))
    }

    /// Applies an op replayed from the journal, clearing undo/redo history.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        let seq = stored.seq;
        let op = stored.op;
        match op {
            Op::Insert { entry } => {
                self.apply_insert_with_seq(entry, seq)?;
            }
            Op::Patch { id, patch, .. } => {
                self.apply_patch_with_seq(id, patch, seq)?;
            }
            Op::SetStatus {
                id,
                status,
                prev_status,
            } => {
                self.apply_set_status_with_seq(id, status, prev_status, seq)?;
            }
        }
        self.undo.clear();
        self.redo.clear();
        Ok(())
    }

    /// Returns the entry with `id`, if present.
    pub fn get(&self, id: EntryId) -> Option<&EntryRecord> {
        self.records.get(&id)
    }

    /// Cloning variant of [`EntryStore::get`].
    pub fn get_cloned(&self, id: EntryId) -> Option<EntryRecord> {
        self.get(id).cloned()
    }

    /// Returns the most recently inserted `n` entries in insertion order.
    pub fn recent(&self, n: usize) -> Vec<&EntryRecord> {
        let len = self.order.len();
        let start = len.saturating_sub(n);
        self.order[start..]
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Cloning variant of [`EntryStore::recent`].
    pub fn recent_cloned(&self, n: usize) -> Vec<EntryRecord> {
        self.recent(n).into_iter().cloned().collect()
    }

    /// Returns entries assigned to the named boat, in insert order.
    pub fn by_boat(&self, boat: &str) -> Vec<&EntryRecord> {
        self.by_boat
            .get(boat)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Cloning variant of [`EntryStore::by_boat`].
    pub fn by_boat_cloned(&self, boat: &str) -> Vec<EntryRecord> {
        self.by_boat(boat).into_iter().cloned().collect()
    }

    /// Returns entries racing on the given day, in insert order.
    pub fn on_day(&self, day: &str) -> Vec<&EntryRecord> {
        self.by_day
            .get(day)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Entry ids in insertion order.
    pub fn ordered_ids(&self) -> &[EntryId] {
        &self.order
    }

    /// All records in insertion order; the engine's snapshot view.
    pub fn ordered_records(&self) -> Vec<&EntryRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Drains ops accumulated since the last drain, for persistence.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Depth of the undo stack.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Depth of the redo stack.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Highest operation sequence assigned so far.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn apply_op(&mut self, op: Op) -> Result<(StoredOp, Op), StoreError> {
        match op {
            Op::Insert { entry } => self.apply_insert(entry),
            Op::Patch { id, patch, .. } => self.apply_patch(id, patch),
            Op::SetStatus {
                id,
                status,
                prev_status,
            } => self.apply_set_status(id, status, prev_status),
        }
    }

    fn apply_insert(&mut self, entry: EntryRecord) -> Result<(StoredOp, Op), StoreError> {
        let seq = self.take_next_op_seq();
        self.apply_insert_with_seq(entry, seq)
    }

    fn apply_insert_with_seq(
        &mut self,
        entry: EntryRecord,
        seq: OpSeq,
    ) -> Result<(StoredOp, Op), StoreError> {
        if self.records.contains_key(&entry.id) {
            return Err(StoreError::AlreadyExists(entry.id));
        }

        let id = entry.id;
        let prev_status = entry.status;
        self.next_entry_id = self.next_entry_id.max(id.saturating_add(1));
        self.insert_indices(&entry);
        self.pos.insert(id, self.order.len());
        self.order.push(id);
        self.records.insert(id, entry.clone());

        self.bump_next_seq_from(seq);
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Insert { entry },
        };
        // Inverting an insert withdraws the entry rather than deleting it;
        // the journal stays append-only and the id remains stable.
        let inverse = Op::SetStatus {
            id,
            status: EntryStatus::Withdrawn,
            prev_status,
        };
        Ok((stored, inverse))
    }

    fn apply_patch(&mut self, id: EntryId, patch: EntryPatch) -> Result<(StoredOp, Op), StoreError> {
        let seq = self.take_next_op_seq();
        self.apply_patch_with_seq(id, patch, seq)
    }

    fn apply_patch_with_seq(
        &mut self,
        id: EntryId,
        patch: EntryPatch,
        seq: OpSeq,
    ) -> Result<(StoredOp, Op), StoreError> {
        let rec = self.records.get_mut(&id).ok_or(StoreError::MissingEntry(id))?;
        let old_boat = rec.boat.clone();
        let old_day = rec.day.clone();

        let prev = patch.capture_inverse_for(rec);
        patch.apply_to(rec);

        if rec.boat != old_boat {
            Self::remove_from_vec_index(self.by_boat.entry(old_boat).or_default(), id);
            self.by_boat.entry(rec.boat.clone()).or_default().push(id);
        }

        if rec.day != old_day {
            Self::remove_from_vec_index(self.by_day.entry(old_day).or_default(), id);
            self.by_day.entry(rec.day.clone()).or_default().push(id);
        }

        self.bump_next_seq_from(seq);
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Patch {
                id,
                patch: patch.clone(),
                prev: prev.clone(),
            },
        };
        let inverse = Op::Patch {
            id,
            patch: prev,
            prev: patch,
        };
        Ok((stored, inverse))
    }

    fn apply_set_status(
        &mut self,
        id: EntryId,
        status: EntryStatus,
        prev_status: EntryStatus,
    ) -> Result<(StoredOp, Op), StoreError> {
        let seq = self.take_next_op_seq();
        self.apply_set_status_with_seq(id, status, prev_status, seq)
    }

    fn apply_set_status_with_seq(
        &mut self,
        id: EntryId,
        status: EntryStatus,
        prev_status: EntryStatus,
        seq: OpSeq,
    ) -> Result<(StoredOp, Op), StoreError> {
        {
            let rec = self.records.get_mut(&id).ok_or(StoreError::MissingEntry(id))?;
            rec.status = status;
        }

        self.bump_next_seq_from(seq);
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::SetStatus {
                id,
                status,
                prev_status,
            },
        };
        let inverse = Op::SetStatus {
            id,
            status: prev_status,
            prev_status: status,
        };
        Ok((stored, inverse))
    }

    fn insert_indices(&mut self, rec: &EntryRecord) {
        self.by_boat.entry(rec.boat.clone()).or_default().push(rec.id);
        self.by_day.entry(rec.day.clone()).or_default().push(rec.id);
    }

    fn remove_from_vec_index(v: &mut Vec<EntryId>, id: EntryId) {
        if let Some(pos) = v.iter().position(|x| *x == id) {
            v.remove(pos);
        }
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
