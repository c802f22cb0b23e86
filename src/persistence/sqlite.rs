//! SQLite record store (sqlx).
//!
//! One table keyed by requester id. The pool holds a single connection so
//! writes are serialized by the pool itself; each upsert runs its
//! conflict check and write inside one transaction.

use super::records::*;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS verification_records (
    requester_id   TEXT PRIMARY KEY NOT NULL,
    transaction_id TEXT NOT NULL,
    address        TEXT NOT NULL,
    signature      TEXT NOT NULL,
    verified_at    INTEGER NOT NULL,
    status         TEXT NOT NULL,
    revision       INTEGER NOT NULL DEFAULT 1,
    removal_pending INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_verification_records_status
    ON verification_records (status);
CREATE INDEX IF NOT EXISTS idx_verification_records_txid
    ON verification_records (transaction_id);
"#;

const SELECT_COLUMNS: &str = "SELECT requester_id, transaction_id, address, signature, \
     verified_at, status, revision, removal_pending FROM verification_records";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database (tests).
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// A conditional update matched nothing: `false` if the record exists.
    async fn unchanged_or_missing(&self, requester_id: &str) -> StoreResult<bool> {
        match self.get(requester_id).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(requester_id.to_string())),
        }
    }
}

fn record_from_row(row: &SqliteRow) -> StoreResult<VerificationRecord> {
    let status: String = row.try_get("status")?;
    let verified_at: i64 = row.try_get("verified_at")?;
    let revision: i64 = row.try_get("revision")?;

    Ok(VerificationRecord {
        requester_id: row.try_get("requester_id")?,
        transaction_id: row.try_get("transaction_id")?,
        address: row.try_get("address")?,
        signature: row.try_get("signature")?,
        verified_at: verified_at.max(0) as u64,
        status: status.parse()?,
        revision: revision.max(0) as u64,
        removal_pending: row.try_get("removal_pending")?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, requester_id: &str) -> StoreResult<Option<VerificationRecord>> {
        let row = sqlx::query(&format!("{} WHERE requester_id = ?", SELECT_COLUMNS))
            .bind(requester_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: VerificationRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        if record.is_active() {
            let holder: Option<String> = sqlx::query_scalar(
                "SELECT requester_id FROM verification_records \
                 WHERE transaction_id = ? AND status = ? AND requester_id != ? LIMIT 1",
            )
            .bind(&record.transaction_id)
            .bind(RecordStatus::Active.as_str())
            .bind(&record.requester_id)
            .fetch_optional(&mut *tx)
            .await?;

            if holder.is_some() {
                return Err(StoreError::DuplicateConflict {
                    transaction_id: record.transaction_id,
                });
            }
        }

        sqlx::query(
            "INSERT INTO verification_records \
                 (requester_id, transaction_id, address, signature, verified_at, status, \
                  revision, removal_pending) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?) \
             ON CONFLICT(requester_id) DO UPDATE SET \
                 transaction_id = excluded.transaction_id, \
                 address = excluded.address, \
                 signature = excluded.signature, \
                 verified_at = excluded.verified_at, \
                 status = excluded.status, \
                 revision = verification_records.revision + 1, \
                 removal_pending = excluded.removal_pending",
        )
        .bind(&record.requester_id)
        .bind(&record.transaction_id)
        .bind(&record.address)
        .bind(&record.signature)
        .bind(record.verified_at as i64)
        .bind(record.status.as_str())
        .bind(record.removal_pending)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<VerificationRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE status = ? ORDER BY requester_id",
            SELECT_COLUMNS
        ))
        .bind(RecordStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn list_all(&self) -> StoreResult<Vec<VerificationRecord>> {
        let rows = sqlx::query(&format!("{} ORDER BY requester_id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn mark_revoked(&self, requester_id: &str) -> StoreResult<RecordFence> {
        let row = sqlx::query(
            "UPDATE verification_records SET status = ?, removal_pending = 1 \
             WHERE requester_id = ? RETURNING transaction_id, revision",
        )
        .bind(RecordStatus::Revoked.as_str())
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(requester_id.to_string()))?;

        let revision: i64 = row.try_get("revision")?;
        Ok(RecordFence {
            transaction_id: row.try_get("transaction_id")?,
            revision: revision.max(0) as u64,
        })
    }

    async fn revoke_if_unchanged(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE verification_records SET status = ?, removal_pending = 1 \
             WHERE requester_id = ? AND status = ? AND transaction_id = ? AND revision = ?",
        )
        .bind(RecordStatus::Revoked.as_str())
        .bind(requester_id)
        .bind(RecordStatus::Active.as_str())
        .bind(&fence.transaction_id)
        .bind(fence.revision as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.unchanged_or_missing(requester_id).await
    }

    async fn list_pending_removals(&self) -> StoreResult<Vec<VerificationRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE status = ? AND removal_pending = 1 ORDER BY requester_id",
            SELECT_COLUMNS
        ))
        .bind(RecordStatus::Revoked.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn complete_removal(&self, requester_id: &str, fence: &RecordFence) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE verification_records SET removal_pending = 0 \
             WHERE requester_id = ? AND status = ? AND removal_pending = 1 \
               AND transaction_id = ? AND revision = ?",
        )
        .bind(requester_id)
        .bind(RecordStatus::Revoked.as_str())
        .bind(&fence.transaction_id)
        .bind(fence.revision as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.unchanged_or_missing(requester_id).await
    }
}
