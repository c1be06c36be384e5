//! Upload subsystem
//!
//! Drives buffered chunks from the durable store to the remote object
//! store: a bounded-concurrency scheduler with exponential backoff, the
//! presign client that issues delivery targets, and the byte transport.

pub mod presign;
pub mod scheduler;
pub mod transport;
pub mod types;

pub use presign::{HttpPresignService, PresignService, UploadTarget};
pub use scheduler::UploadScheduler;
pub use transport::{ChunkTransport, HttpTransport};
pub use types::{RetryPolicy, UploadEvent};
