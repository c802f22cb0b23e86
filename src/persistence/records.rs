//! Verification records and the store contract.
//!
//! Invariants:
//! - At most one record per requester id (the key)
//! - Address and signature are written together, never independently
//! - Records are revoked, never deleted (audit trail)
//! - One Active record per transaction id across all requesters
//! - Every write of a verification bumps the record's revision
//! - A revoked record keeps `removal_pending` until channel removal is confirmed

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Lifecycle status of a verification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Revoked,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RecordStatus::Active),
            "revoked" => Ok(RecordStatus::Revoked),
            other => Err(StoreError::Backend(format!("unknown record status '{}'", other))),
        }
    }
}

/// A requester's verified binding to a collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub requester_id: String,
    pub transaction_id: String,
    pub address: String,
    pub signature: String,
    /// Unix timestamp (seconds) of the verification event.
    pub verified_at: u64,
    pub status: RecordStatus,
    /// Store-assigned, strictly increasing per requester. Zero until stored.
    pub revision: u64,
    /// Revoked, but the privilege has not been confirmed removed yet.
    pub removal_pending: bool,
}

impl VerificationRecord {
    /// A freshly verified (Active) record.
    pub fn active(
        requester_id: &str,
        transaction_id: &str,
        address: &str,
        signature: &str,
        verified_at: u64,
    ) -> Self {
        Self {
            requester_id: requester_id.to_string(),
            transaction_id: transaction_id.to_string(),
            address: address.to_string(),
            signature: signature.to_string(),
            verified_at,
            status: RecordStatus::Active,
            revision: 0,
            removal_pending: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Identity of the verification event this record carries.
    pub fn fence(&self) -> RecordFence {
        RecordFence {
            transaction_id: self.transaction_id.clone(),
            revision: self.revision,
        }
    }
}

/// The verification event a sweep decision was based on.
///
/// A conditional revocation only applies while the stored record still
/// carries this exact event. Timestamps are too coarse for that (two
/// verifications can share a second), so the revision decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFence {
    pub transaction_id: String,
    pub revision: u64,
}

impl RecordFence {
    pub fn matches(&self, record: &VerificationRecord) -> bool {
        record.revision == self.revision && record.transaction_id == self.transaction_id
    }
}

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Transaction {transaction_id} is already bound to another requester")]
    DuplicateConflict { transaction_id: String },

    #[error("No record for requester {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable requester -> verification record mapping.
///
/// Writes to the same requester id serialize; the last committed write wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, requester_id: &str) -> StoreResult<Option<VerificationRecord>>;

    /// Insert or atomically overwrite the record for `record.requester_id`.
    ///
    /// The incoming revision is ignored: the stored one becomes the
    /// previous revision plus one (1 for a new requester). Fails with
    /// `DuplicateConflict` when another requester holds an Active record
    /// for the same transaction id.
    async fn upsert(&self, record: VerificationRecord) -> StoreResult<()>;

    /// Snapshot of all Active records at call time.
    async fn list_active(&self) -> StoreResult<Vec<VerificationRecord>>;

    /// Snapshot of every record regardless of status.
    async fn list_all(&self) -> StoreResult<Vec<VerificationRecord>>;

    /// Move a record to Revoked unconditionally, with removal pending.
    /// Returns the fence of the revoked record.
    async fn mark_revoked(&self, requester_id: &str) -> StoreResult<RecordFence>;

    /// Move a record to Revoked, with removal pending, only if it is Active
    /// and still carries `fence`. Returns `false` when the record changed
    /// since it was read.
    async fn revoke_if_unchanged(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool>;

    /// Revoked records whose privilege removal is not confirmed yet.
    async fn list_pending_removals(&self) -> StoreResult<Vec<VerificationRecord>>;

    /// Clear `removal_pending` if the record is still the revoked one
    /// described by `fence`. Returns `false` when it changed meanwhile.
    async fn complete_removal(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn get(&self, requester_id: &str) -> StoreResult<Option<VerificationRecord>> {
        (**self).get(requester_id).await
    }

    async fn upsert(&self, record: VerificationRecord) -> StoreResult<()> {
        (**self).upsert(record).await
    }

    async fn list_active(&self) -> StoreResult<Vec<VerificationRecord>> {
        (**self).list_active().await
    }

    async fn list_all(&self) -> StoreResult<Vec<VerificationRecord>> {
        (**self).list_all().await
    }

    async fn mark_revoked(&self, requester_id: &str) -> StoreResult<RecordFence> {
        (**self).mark_revoked(requester_id).await
    }

    async fn revoke_if_unchanged(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool> {
        (**self).revoke_if_unchanged(requester_id, fence).await
    }

    async fn list_pending_removals(&self) -> StoreResult<Vec<VerificationRecord>> {
        (**self).list_pending_removals().await
    }

    async fn complete_removal(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool> {
        (**self).complete_removal(requester_id, fence).await
    }
}
