//! Authoritative in-memory regatta entry log with equipment clash detection
//! and append-only SQLite journaling.
//!
//! # Examples
//!
//! Pure clash detection over a snapshot:
//! ```
//! use oarlog::{
//!     clash::{
//!         detect::detect_boat_clashes,
//!         grouping::{partition_entries, GroupIndex},
//!     },
//!     entry::EntryRecord,
//!     types::EntryStatus,
//! };
//!
//! let entry = EntryRecord {
//!     id: 1,
//!     race_id: 1,
//!     day: "Sat".to_string(),
//!     division: "J16".to_string(),
//!     event: "J16 2-".to_string(),
//!     boat: "Eight A".to_string(),
//!     blades: "SetX".to_string(),
//!     status: EntryStatus::Entered,
//! };
//! let entries = vec![entry.clone(), EntryRecord { id: 2, ..entry }];
//!
//! let index = GroupIndex::build(&[]);
//! let buckets = partition_entries(&entries, &index);
//! let clashes = detect_boat_clashes(&buckets, &[], None);
//! assert_eq!(clashes.len(), 1);
//! assert_eq!(clashes[0].boat, "Eight A");
//! assert_eq!(clashes[0].count, 2);
//! ```
//!
//! Runtime usage with SQLite sink:
//! ```no_run
//! use oarlog::{
//!     core::store::EntryStore,
//!     entry::EntryDraft,
//!     persist::sqlite::SqliteOpSink,
//!     runtime::handle::{spawn_oarlog, RuntimeConfig},
//!     types::EntryStatus,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteOpSink::open("oarlog.db").expect("open sqlite");
//! let handle = spawn_oarlog(EntryStore::new(), Some(Box::new(sink)), RuntimeConfig::default());
//! let _id = handle.insert(EntryDraft {
//!     race_id: 1,
//!     day: "Sat".to_string(),
//!     division: "Div 1".to_string(),
//!     event: "Novice 8+".to_string(),
//!     boat: "Eight A".to_string(),
//!     blades: "SetX".to_string(),
//!     status: EntryStatus::Entered,
//! }).await.expect("insert");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Equipment clash detection engine.
pub mod clash;
/// Core in-memory store and index helpers.
pub mod core;
/// Entry domain records and patches.
pub mod entry;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Reference-data records: groups, inventory, silences.
pub mod regatta;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
