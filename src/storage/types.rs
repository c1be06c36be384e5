use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Recording,
    Stopped,
    Completed,
}

/// Delivery state of a buffered chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkState {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

/// One continuous recording, composed of an ordered sequence of chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub chunks_produced: u64,
    pub chunks_uploaded: u64,
    pub chunks_failed: u64,
}

/// One buffered audio chunk with its delivery metadata.
///
/// The byte payload is immutable once stored; only the delivery-state
/// fields mutate. A `Failed` chunk with no `retry_at` has exhausted its
/// retry budget and waits for external recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub session_id: String,
    pub seq: u32,
    pub payload: Vec<u8>,
    pub content_type: String,
    pub duration_ms: u32,
    pub captured_at: DateTime<Utc>,
    pub state: ChunkState,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub retry_at: Option<DateTime<Utc>>,
    pub remote_key: Option<String>,
}

impl Chunk {
    /// Whether this chunk has exhausted its retry budget and will not be
    /// attempted again without manual intervention.
    pub fn is_terminal_failure(&self) -> bool {
        self.state == ChunkState::Failed && self.retry_at.is_none()
    }
}

/// Lightweight handle to a stored chunk, without the byte payload.
///
/// The scheduler works from these; payload bytes are only loaded for the
/// duration of a transmit attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRef {
    pub session_id: String,
    pub seq: u32,
    pub content_type: String,
    pub attempt_count: u32,
    pub size_bytes: u64,
}

/// Aggregate store counters for monitoring and cleanup decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: u64,
    pub total_bytes: u64,
    pub pending: u64,
    pub uploading: u64,
    pub uploaded: u64,
    pub failed: u64,
}
