//! Configuration sections with their documented defaults.

use serde::Deserialize;
use std::path::PathBuf;

/// Settings for the local durable chunk store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database file holding sessions and buffered chunks.
    pub db_path: PathBuf,
    /// Byte quota across all buffered chunk payloads. Admission of new
    /// chunks fails with a distinct quota error once this is reached.
    pub max_store_bytes: u64,
    /// Age in days past which buffered chunks are eligible for cleanup.
    pub retention_days: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("steno.sqlite3"),
            max_store_bytes: 512 * 1024 * 1024,
            retention_days: 14,
        }
    }
}

/// Settings for the upload scheduler's concurrency and retry policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UploaderSettings {
    /// Upper bound on simultaneously in-flight uploads.
    pub max_concurrent: usize,
    /// Attempts per chunk before it is parked as a terminal failure.
    pub max_retries: u32,
    /// First retry delay; doubles on every subsequent failure.
    pub base_delay_ms: u64,
    /// Cap on the computed retry delay.
    pub max_delay_ms: u64,
    /// Per-attempt timeout covering both target acquisition and transmit.
    pub transmit_timeout_secs: u64,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            transmit_timeout_secs: 30,
        }
    }
}

/// Settings for the capture admission gate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Segments below this size are rejected at admission. Tuned to 1000
    /// bytes after a production incident where a suspended capture source
    /// produced header-only containers with zero audio frames.
    pub min_chunk_bytes: usize,
    /// Also require the container byte signature implied by the declared
    /// content type.
    pub verify_signatures: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            min_chunk_bytes: 1000,
            verify_signatures: true,
        }
    }
}

/// Settings for the external presign collaborator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Endpoint issuing time-limited upload targets.
    pub presign_endpoint: String,
    /// Bearer credential presented to the presign endpoint. Usually
    /// injected through the environment rather than the config file.
    pub bearer_token: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            presign_endpoint: String::from("http://127.0.0.1:8080/presign"),
            bearer_token: None,
        }
    }
}
