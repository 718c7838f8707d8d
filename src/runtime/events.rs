//! Runtime event stream payloads.

use crate::types::{EntryId, EntryStatus, OpSeq};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEvent {
    /// A new entry was inserted.
    Inserted {
        /// Inserted entry id.
        id: EntryId,
    },
    /// An existing entry was updated.
    Updated {
        /// Updated entry id.
        id: EntryId,
    },
    /// An entry's lifecycle status changed.
    StatusChanged {
        /// Affected entry id.
        id: EntryId,
        /// New status.
        status: EntryStatus,
    },
    /// One undo step was applied.
    UndoApplied,
    /// One redo step was applied.
    RedoApplied,
    /// Groups, inventory, or silences were replaced.
    ReferenceUpdated,
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
