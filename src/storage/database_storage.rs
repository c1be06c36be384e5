use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use async_trait::async_trait;

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::ChunkStore;
use crate::storage::types::{
    Chunk, ChunkRef, ChunkState, SessionRecord, SessionStatus, StoreStats,
};

fn state_to_str(state: ChunkState) -> &'static str {
    match state {
        ChunkState::Pending => "pending",
        ChunkState::Uploading => "uploading",
        ChunkState::Uploaded => "uploaded",
        ChunkState::Failed => "failed",
    }
}

fn state_from_str(raw: &str) -> Result<ChunkState, StorageError> {
    match raw {
        "pending" => Ok(ChunkState::Pending),
        "uploading" => Ok(ChunkState::Uploading),
        "uploaded" => Ok(ChunkState::Uploaded),
        "failed" => Ok(ChunkState::Failed),
        _ => Err(StorageError::ReadFailed),
    }
}

fn status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Recording => "recording",
        SessionStatus::Stopped => "stopped",
        SessionStatus::Completed => "completed",
    }
}

fn status_from_str(raw: &str) -> Result<SessionStatus, StorageError> {
    match raw {
        "recording" => Ok(SessionStatus::Recording),
        "stopped" => Ok(SessionStatus::Stopped),
        "completed" => Ok(SessionStatus::Completed),
        _ => Err(StorageError::ReadFailed),
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| StorageError::ReadFailed)
}

fn parse_opt_ts(raw: &Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    match raw {
        Some(s) => Ok(Some(parse_ts(s)?)),
        None => Ok(None),
    }
}

// Internal row mappings to avoid manual try_get
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    owner_id: String,
    created_at: String,
    status: String,
    chunks_produced: i64,
    chunks_uploaded: i64,
    chunks_failed: i64,
}

impl SessionRow {
    fn into_session(self) -> Result<SessionRecord, StorageError> {
        Ok(SessionRecord {
            id: self.id,
            owner_id: self.owner_id,
            created_at: parse_ts(&self.created_at)?,
            status: status_from_str(&self.status)?,
            chunks_produced: self.chunks_produced as u64,
            chunks_uploaded: self.chunks_uploaded as u64,
            chunks_failed: self.chunks_failed as u64,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChunkRow {
    session_id: String,
    seq: i64,
    payload: Vec<u8>,
    content_type: String,
    duration_ms: i64,
    captured_at: String,
    state: String,
    attempt_count: i64,
    last_error: Option<String>,
    last_attempt_at: Option<String>,
    retry_at: Option<String>,
    remote_key: Option<String>,
}

impl ChunkRow {
    fn into_chunk(self) -> Result<Chunk, StorageError> {
        Ok(Chunk {
            session_id: self.session_id,
            seq: self.seq as u32,
            payload: self.payload,
            content_type: self.content_type,
            duration_ms: self.duration_ms as u32,
            captured_at: parse_ts(&self.captured_at)?,
            state: state_from_str(&self.state)?,
            attempt_count: self.attempt_count as u32,
            last_error: self.last_error,
            last_attempt_at: parse_opt_ts(&self.last_attempt_at)?,
            retry_at: parse_opt_ts(&self.retry_at)?,
            remote_key: self.remote_key,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChunkRefRow {
    session_id: String,
    seq: i64,
    content_type: String,
    attempt_count: i64,
    size_bytes: i64,
}

impl ChunkRefRow {
    fn into_chunk_ref(self) -> ChunkRef {
        ChunkRef {
            session_id: self.session_id,
            seq: self.seq as u32,
            content_type: self.content_type,
            attempt_count: self.attempt_count as u32,
            size_bytes: self.size_bytes as u64,
        }
    }
}

/// SQLite-backed durable chunk store.
///
/// One row per session, one row per chunk; chunk payloads live in a BLOB
/// column and never mutate after insert. Delivery-state transitions are
/// single guarded UPDATE statements, so an update only applies from the
/// expected current state.
pub struct DatabaseStorage {
    pool: Pool<Sqlite>,
    max_store_bytes: u64,
}

impl DatabaseStorage {
    /// Create or open the database at `path` with the given payload quota.
    pub async fn open<P: AsRef<Path>>(path: P, max_store_bytes: u64) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent).map_err(|_| StorageError::WriteFailed)?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path_ref)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL,
                chunks_produced INTEGER NOT NULL DEFAULT 0,
                chunks_uploaded INTEGER NOT NULL DEFAULT 0,
                chunks_failed INTEGER NOT NULL DEFAULT 0
            );",
        )
        .execute(&pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                payload BLOB NOT NULL,
                content_type TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                captured_at TEXT NOT NULL,
                state TEXT NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_attempt_at TEXT,
                retry_at TEXT,
                remote_key TEXT,
                PRIMARY KEY (session_id, seq),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );",
        )
        .execute(&pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        // The scheduler polls by state on every tick; keep that indexed.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_state ON chunks (state, session_id, seq);",
        )
        .execute(&pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;

        Ok(Self {
            pool,
            max_store_bytes,
        })
    }
}

#[async_trait]
impl ChunkStore for DatabaseStorage {
    async fn create_session(&self, session_id: &str, owner_id: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR IGNORE INTO sessions (id, owner_id, created_at, status)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(owner_id)
        .bind(Utc::now().to_rfc3339())
        .bind(status_to_str(SessionStatus::Recording))
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, owner_id, created_at, status, chunks_produced, chunks_uploaded, chunks_failed
             FROM sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| StorageError::ReadFailed)?;
        row.map(SessionRow::into_session).transpose()
    }

    async fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE sessions SET status = ?2 WHERE id = ?1")
            .bind(session_id)
            .bind(status_to_str(status))
            .execute(&self.pool)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn put_chunk(
        &self,
        session_id: &str,
        seq: u32,
        payload: &[u8],
        content_type: &str,
        duration_ms: u32,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;

        let used: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM chunks")
            .fetch_one(&mut *tx)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        if used as u64 + payload.len() as u64 > self.max_store_bytes {
            return Err(StorageError::QuotaExceeded);
        }

        sqlx::query(
            "INSERT INTO chunks (session_id, seq, payload, content_type, duration_ms, captured_at, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(session_id)
        .bind(seq as i64)
        .bind(payload)
        .bind(content_type)
        .bind(duration_ms as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(state_to_str(ChunkState::Pending))
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StorageError::Conflict,
            _ => StorageError::WriteFailed,
        })?;

        sqlx::query("UPDATE sessions SET chunks_produced = chunks_produced + 1 WHERE id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|_| StorageError::WriteFailed)?;

        tx.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    async fn get_chunk(&self, session_id: &str, seq: u32) -> Result<Option<Chunk>, StorageError> {
        let row: Option<ChunkRow> = sqlx::query_as(
            "SELECT session_id, seq, payload, content_type, duration_ms, captured_at, state,
                    attempt_count, last_error, last_attempt_at, retry_at, remote_key
             FROM chunks WHERE session_id = ?1 AND seq = ?2",
        )
        .bind(session_id)
        .bind(seq as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| StorageError::ReadFailed)?;
        row.map(ChunkRow::into_chunk).transpose()
    }

    async fn list_by_state(
        &self,
        session_id: Option<&str>,
        state: ChunkState,
    ) -> Result<Vec<ChunkRef>, StorageError> {
        let rows: Vec<ChunkRefRow> = match session_id {
            Some(sid) => sqlx::query_as(
                "SELECT session_id, seq, content_type, attempt_count, LENGTH(payload) AS size_bytes
                 FROM chunks WHERE state = ?1 AND session_id = ?2
                 ORDER BY session_id ASC, seq ASC",
            )
            .bind(state_to_str(state))
            .bind(sid)
            .fetch_all(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?,
            None => sqlx::query_as(
                "SELECT session_id, seq, content_type, attempt_count, LENGTH(payload) AS size_bytes
                 FROM chunks WHERE state = ?1
                 ORDER BY session_id ASC, seq ASC",
            )
            .bind(state_to_str(state))
            .fetch_all(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?,
        };
        Ok(rows.into_iter().map(ChunkRefRow::into_chunk_ref).collect())
    }

    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ChunkRef>, StorageError> {
        let rows: Vec<ChunkRefRow> = sqlx::query_as(
            "SELECT session_id, seq, content_type, attempt_count, LENGTH(payload) AS size_bytes
             FROM chunks
             WHERE state = 'pending'
                OR (state = 'failed' AND retry_at IS NOT NULL AND retry_at <= ?1)
             ORDER BY session_id ASC, seq ASC
             LIMIT ?2",
        )
        .bind(now.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|_| StorageError::ReadFailed)?;
        Ok(rows.into_iter().map(ChunkRefRow::into_chunk_ref).collect())
    }

    async fn next_retry_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT MIN(retry_at) FROM chunks
             WHERE state = 'failed' AND retry_at IS NOT NULL AND retry_at > ?1",
        )
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|_| StorageError::ReadFailed)?;
        parse_opt_ts(&raw)
    }

    async fn mark_uploading(&self, session_id: &str, seq: u32) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE chunks SET state = 'uploading', last_attempt_at = ?3
             WHERE session_id = ?1 AND seq = ?2 AND state IN ('pending', 'failed')",
        )
        .bind(session_id)
        .bind(seq as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn mark_uploaded(
        &self,
        session_id: &str,
        seq: u32,
        remote_key: &str,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;
        let result = sqlx::query(
            "UPDATE chunks SET state = 'uploaded', remote_key = ?3, retry_at = NULL, last_error = NULL
             WHERE session_id = ?1 AND seq = ?2 AND state = 'uploading'",
        )
        .bind(session_id)
        .bind(seq as i64)
        .bind(remote_key)
        .execute(&mut *tx)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        sqlx::query("UPDATE sessions SET chunks_uploaded = chunks_uploaded + 1 WHERE id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
        tx.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        session_id: &str,
        seq: u32,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;
        let result = sqlx::query(
            "UPDATE chunks SET state = 'failed', attempt_count = attempt_count + 1,
                    last_error = ?3, last_attempt_at = ?4, retry_at = ?5
             WHERE session_id = ?1 AND seq = ?2 AND state = 'uploading'",
        )
        .bind(session_id)
        .bind(seq as i64)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(retry_at.map(|d| d.to_rfc3339()))
        .execute(&mut *tx)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        if retry_at.is_none() {
            sqlx::query("UPDATE sessions SET chunks_failed = chunks_failed + 1 WHERE id = ?1")
                .bind(session_id)
                .execute(&mut *tx)
                .await
                .map_err(|_| StorageError::WriteFailed)?;
        }
        tx.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    async fn requeue_interrupted(&self) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE chunks SET state = 'pending', retry_at = NULL WHERE state = 'uploading'",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(result.rows_affected())
    }

    async fn requeue_chunk(&self, session_id: &str, seq: u32) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;
        let result = sqlx::query(
            "UPDATE chunks SET state = 'pending', attempt_count = 0, retry_at = NULL, last_error = NULL
             WHERE session_id = ?1 AND seq = ?2 AND state = 'failed' AND retry_at IS NULL",
        )
        .bind(session_id)
        .bind(seq as i64)
        .execute(&mut *tx)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        sqlx::query(
            "UPDATE sessions SET chunks_failed = chunks_failed - 1
             WHERE id = ?1 AND chunks_failed > 0",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        tx.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<u64, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
        tx.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(count as u64)
    }

    async fn delete_chunks_older_than(&self, days: u32) -> Result<u64, StorageError> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let result = sqlx::query(
            "DELETE FROM chunks
             WHERE captured_at < ?1 AND NOT (state = 'failed' AND retry_at IS NULL)",
        )
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, session_id: Option<&str>) -> Result<StoreStats, StorageError> {
        let rows: Vec<(String, i64, i64)> = match session_id {
            Some(sid) => sqlx::query_as(
                "SELECT state, COUNT(*), COALESCE(SUM(LENGTH(payload)), 0)
                 FROM chunks WHERE session_id = ?1 GROUP BY state",
            )
            .bind(sid)
            .fetch_all(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?,
            None => sqlx::query_as(
                "SELECT state, COUNT(*), COALESCE(SUM(LENGTH(payload)), 0)
                 FROM chunks GROUP BY state",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?,
        };

        let mut stats = StoreStats::default();
        for (state, count, bytes) in rows {
            stats.total_chunks += count as u64;
            stats.total_bytes += bytes as u64;
            match state_from_str(&state)? {
                ChunkState::Pending => stats.pending = count as u64,
                ChunkState::Uploading => stats.uploading = count as u64,
                ChunkState::Uploaded => stats.uploaded = count as u64,
                ChunkState::Failed => stats.failed = count as u64,
            }
        }
        Ok(stats)
    }
}
