use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::configuration::types::UploaderSettings;

/// Observability events emitted while chunks move through delivery.
///
/// Consumed by the surrounding UI layer purely for display; nothing in the
/// pipeline depends on anyone listening.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started {
        session_id: String,
        seq: u32,
    },
    /// Emitted when the transport reports confirmed bytes. Transports that
    /// cannot observe partial progress report once, on completion.
    Progress {
        session_id: String,
        seq: u32,
        bytes_sent: u64,
    },
    Completed {
        session_id: String,
        seq: u32,
        remote_key: String,
    },
    Failed {
        session_id: String,
        seq: u32,
        error: String,
        next_retry_at: Option<DateTime<Utc>>,
        terminal: bool,
    },
}

/// Exponential backoff with a cap and a bounded attempt budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &UploaderSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_retries: settings.max_retries,
        }
    }

    /// Delay before the next attempt, given how many attempts have already
    /// failed: `min(base * 2^attempts, max)`.
    pub fn delay_for(&self, attempts_so_far: u32) -> Duration {
        let factor = 1u64 << attempts_so_far.min(20);
        let millis = (self.base_delay.as_millis() as u64)
            .saturating_mul(factor)
            .min(self.max_delay.as_millis() as u64);
        Duration::from_millis(millis)
    }
}
