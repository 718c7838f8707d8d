//! Mutation operation model and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::{
    entry::{EntryPatch, EntryRecord},
    types::{EntryId, EntryStatus, OpSeq},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Insert a fully materialized entry.
    Insert {
        /// Inserted record.
        entry: EntryRecord,
    },
    /// Patch a record, including precomputed inverse patch.
    Patch {
        /// Entry id to mutate.
        id: EntryId,
        /// Forward patch.
        patch: EntryPatch,
        /// Inverse patch that restores prior state.
        prev: EntryPatch,
    },
    /// Transition an entry's lifecycle status.
    SetStatus {
        /// Entry id to mutate.
        id: EntryId,
        /// New status.
        status: EntryStatus,
        /// Status before the transition.
        prev_status: EntryStatus,
    },
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
