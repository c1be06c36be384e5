//! Storage subsystem
//!
//! This module provides the durable chunk store: the local, persistent,
//! transactional buffer that admitted audio chunks live in between capture
//! and confirmed delivery.
//!
//! Components:
//! - `storage_trait`: the ChunkStore trait defining a uniform API.
//! - `types`: session and chunk records shared by storage backends.
//! - `database_storage`: SQLite implementation using sqlx.

pub mod database_storage;
pub mod storage_trait;
pub mod types;

pub use database_storage::DatabaseStorage;
pub use storage_trait::ChunkStore;
pub use types::{Chunk, ChunkRef, ChunkState, SessionRecord, SessionStatus, StoreStats};
