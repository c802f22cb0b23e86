//! Verification record persistence.
//!
//! The store is the single owner of verification records. Two backends
//! implement the same contract:
//! - MemoryRecordStore: tests and ephemeral runs
//! - SqliteRecordStore: the daemon's durable store

pub mod memory;
pub mod records;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use records::{
    RecordFence, RecordStatus, RecordStore, StoreError, StoreResult, VerificationRecord,
};
pub use sqlite::SqliteRecordStore;
