//! Storage layer: the authoritative store and its JSON snapshot.
//!
//! Records live in memory inside [`Store`]; durability comes from full JSON
//! snapshots written after every mutation (atomic temp-file + rename).

/// Snapshot save/load with atomic writes.
pub mod persistence;
/// Library/document/chunk records, referential integrity, and per-library indices.
pub mod store;

pub use persistence::{load_snapshot, save_snapshot, Snapshot, SnapshotRef};
pub use store::{Store, StoreStats};
