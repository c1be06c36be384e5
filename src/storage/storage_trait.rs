//! Chunk Store Trait
//!
//! This module defines the `ChunkStore` trait, the interface for durable
//! chunk-buffer backends.
//!
//! Implementors of this trait are responsible for:
//! - Persisting admitted chunks so no admitted chunk is lost across a
//!   process restart
//! - Tracking per-chunk delivery state with guarded transitions
//! - Enforcing the local byte quota
//! - Cleaning up delivered or aged-out data
//!
//! All operations either fully succeed or fully fail; none retries
//! internally. Retry policy belongs to the upload scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error_handling::types::StorageError;
use crate::storage::types::{Chunk, ChunkRef, ChunkState, SessionRecord, SessionStatus, StoreStats};

/// The `ChunkStore` trait defines the interface for durable chunk storage
/// backends.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Creates a session record if absent. Calling it again with the same
    /// id is a no-op.
    async fn create_session(&self, session_id: &str, owner_id: &str) -> Result<(), StorageError>;

    /// Retrieves a session record.
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Moves a session through its lifecycle. `NotFound` if the session
    /// does not exist.
    async fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), StorageError>;

    /// Persists an admitted chunk with initial state `Pending` and a zero
    /// attempt count. Fails with `QuotaExceeded` when the configured byte
    /// quota would be exhausted; the caller must surface that rather than
    /// silently drop data. The session must already exist.
    async fn put_chunk(
        &self,
        session_id: &str,
        seq: u32,
        payload: &[u8],
        content_type: &str,
        duration_ms: u32,
    ) -> Result<(), StorageError>;

    /// Retrieves one chunk including its payload.
    async fn get_chunk(&self, session_id: &str, seq: u32) -> Result<Option<Chunk>, StorageError>;

    /// Lists chunks in the given state, optionally restricted to one
    /// session, ordered by ascending (session, seq). Served from the state
    /// index, not a full scan.
    async fn list_by_state(
        &self,
        session_id: Option<&str>,
        state: ChunkState,
    ) -> Result<Vec<ChunkRef>, StorageError>;

    /// Lists chunks eligible for an upload attempt: `Pending`, or `Failed`
    /// with a retry time at or before `now`. Ordered by ascending
    /// (session, seq) so each session's contiguous prefix completes as
    /// early as possible.
    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ChunkRef>, StorageError>;

    /// Earliest retry time strictly after `now` among failed chunks, if
    /// any. Used by the scheduler to sleep exactly as long as needed.
    async fn next_retry_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Transitions a chunk to `Uploading`. Only valid from `Pending` or
    /// `Failed`; anything else is a `Conflict`. Marking a chunk uploading
    /// atomically removes it from the eligible set, which is what
    /// guarantees a single in-flight attempt per chunk.
    async fn mark_uploading(&self, session_id: &str, seq: u32) -> Result<(), StorageError>;

    /// Transitions an `Uploading` chunk to `Uploaded` and records the
    /// remote object key.
    async fn mark_uploaded(
        &self,
        session_id: &str,
        seq: u32,
        remote_key: &str,
    ) -> Result<(), StorageError>;

    /// Transitions an `Uploading` chunk to `Failed`, incrementing its
    /// attempt count and recording the error. A `None` retry time parks the
    /// chunk as a terminal failure.
    async fn mark_failed(
        &self,
        session_id: &str,
        seq: u32,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    /// Requeues chunks left in `Uploading` by an interrupted process back
    /// to `Pending`. Returns how many were requeued. Run once at startup,
    /// before the scheduler begins.
    async fn requeue_interrupted(&self) -> Result<u64, StorageError>;

    /// Manual recovery of a terminal failure: resets the chunk to
    /// `Pending` with a fresh attempt budget. `Conflict` unless the chunk
    /// is a terminal failure.
    async fn requeue_chunk(&self, session_id: &str, seq: u32) -> Result<(), StorageError>;

    /// Deletes a session and all of its chunks. Returns the number of
    /// chunks removed.
    async fn delete_session(&self, session_id: &str) -> Result<u64, StorageError>;

    /// Age-based retention: deletes chunks captured more than `days` days
    /// ago, except terminal failures, which stay queryable until someone
    /// deals with them. Returns the number of chunks removed.
    async fn delete_chunks_older_than(&self, days: u32) -> Result<u64, StorageError>;

    /// Aggregate counters, optionally restricted to one session.
    async fn stats(&self, session_id: Option<&str>) -> Result<StoreStats, StorageError>;
}
