//! In-memory record store.
//!
//! Used by tests and by ephemeral runs. A single `RwLock` over the map
//! makes every write atomic; nothing awaits while the lock is held.

use super::records::*;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, VerificationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, requester_id: &str) -> StoreResult<Option<VerificationRecord>> {
        Ok(self.records.read().await.get(requester_id).cloned())
    }

    async fn upsert(&self, mut record: VerificationRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;

        let conflict = record.is_active()
            && records.values().any(|other| {
                other.requester_id != record.requester_id
                    && other.transaction_id == record.transaction_id
                    && other.is_active()
            });
        if conflict {
            return Err(StoreError::DuplicateConflict {
                transaction_id: record.transaction_id,
            });
        }

        record.revision = records
            .get(&record.requester_id)
            .map_or(1, |previous| previous.revision + 1);
        records.insert(record.requester_id.clone(), record);
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<VerificationRecord>> {
        let mut active: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.requester_id.cmp(&b.requester_id));
        Ok(active)
    }

    async fn list_all(&self) -> StoreResult<Vec<VerificationRecord>> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.requester_id.cmp(&b.requester_id));
        Ok(all)
    }

    async fn mark_revoked(&self, requester_id: &str) -> StoreResult<RecordFence> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(requester_id)
            .ok_or_else(|| StoreError::NotFound(requester_id.to_string()))?;
        record.status = RecordStatus::Revoked;
        record.removal_pending = true;
        Ok(record.fence())
    }

    async fn revoke_if_unchanged(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(requester_id)
            .ok_or_else(|| StoreError::NotFound(requester_id.to_string()))?;

        if !record.is_active() || !fence.matches(record) {
            return Ok(false);
        }
        record.status = RecordStatus::Revoked;
        record.removal_pending = true;
        Ok(true)
    }

    async fn list_pending_removals(&self) -> StoreResult<Vec<VerificationRecord>> {
        let mut pending: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.removal_pending && !r.is_active())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.requester_id.cmp(&b.requester_id));
        Ok(pending)
    }

    async fn complete_removal(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(requester_id)
            .ok_or_else(|| StoreError::NotFound(requester_id.to_string()))?;

        if record.is_active() || !record.removal_pending || !fence.matches(record) {
            return Ok(false);
        }
        record.removal_pending = false;
        Ok(true)
    }
}
