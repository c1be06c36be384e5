//! Recording pipeline orchestration.
//!
//! The `Controller` ties the three layers together: every captured segment
//! runs admit → persist → enqueue, sessions move through their lifecycle,
//! and process restarts go through the recovery sweep before the scheduler
//! starts pulling work again.

use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use crate::capture::{Admission, CaptureGate};
use crate::configuration::Config;
use crate::error_handling::types::ControllerError;
use crate::storage::storage_trait::ChunkStore;
use crate::storage::types::{SessionStatus, StoreStats};
use crate::uploader::scheduler::UploadScheduler;

pub struct Controller {
    gate: CaptureGate,
    store: Arc<dyn ChunkStore>,
    scheduler: Arc<UploadScheduler>,
}

impl Controller {
    pub fn new(
        config: &Config,
        store: Arc<dyn ChunkStore>,
        scheduler: Arc<UploadScheduler>,
    ) -> Self {
        Self {
            gate: CaptureGate::new(&config.capture),
            store,
            scheduler,
        }
    }

    /// Starts a recording session, generating an identifier when the caller
    /// has none. Restarting an existing session id is a no-op.
    pub async fn start_session(
        &self,
        session_id: Option<String>,
        owner_id: &str,
    ) -> Result<String, ControllerError> {
        let session_id = session_id.unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));
        self.store.create_session(&session_id, owner_id).await?;
        info!("[{}] session started for {}", session_id, owner_id);
        Ok(session_id)
    }

    /// Runs one captured segment through the pipeline: admission, durable
    /// persistence, then a nudge to the upload scheduler.
    ///
    /// A rejection means the segment was discarded on purpose; a quota
    /// error means nothing was stored and the user must free space before
    /// recording continues.
    pub async fn ingest_segment(
        &self,
        session_id: &str,
        seq: u32,
        payload: &[u8],
        content_type: &str,
        duration_ms: u32,
    ) -> Result<(), ControllerError> {
        match self.gate.admit(payload, content_type) {
            Admission::Admitted => {}
            Admission::Rejected(reason) => return Err(ControllerError::Rejected(reason)),
        }
        self.store
            .put_chunk(session_id, seq, payload, content_type, duration_ms)
            .await?;
        self.scheduler.enqueue(session_id, seq).await?;
        Ok(())
    }

    pub async fn stop_session(&self, session_id: &str) -> Result<(), ControllerError> {
        self.store
            .set_session_status(session_id, SessionStatus::Stopped)
            .await?;
        info!("[{}] session stopped", session_id);
        Ok(())
    }

    pub async fn complete_session(&self, session_id: &str) -> Result<(), ControllerError> {
        self.store
            .set_session_status(session_id, SessionStatus::Completed)
            .await?;
        info!("[{}] session completed", session_id);
        Ok(())
    }

    /// Startup recovery sweep: chunks a previous process left mid-flight go
    /// back to pending and the scheduler is rescheduled. Terminal failures
    /// stay parked; re-attempting those is a deliberate, manual act.
    pub async fn recover(&self) -> Result<u64, ControllerError> {
        let requeued = self.store.requeue_interrupted().await?;
        if requeued > 0 {
            warn!("requeued {} uploads interrupted by the last shutdown", requeued);
            self.scheduler.resume();
        }
        Ok(requeued)
    }

    /// Manual recovery of a terminal failure: resets the chunk's attempt
    /// budget and puts it back in line.
    pub async fn retry_failed(&self, session_id: &str, seq: u32) -> Result<(), ControllerError> {
        self.store.requeue_chunk(session_id, seq).await?;
        self.scheduler.enqueue(session_id, seq).await?;
        info!("[{}] chunk {} manually requeued", session_id, seq);
        Ok(())
    }

    /// Deletes a session and everything it buffered.
    pub async fn delete_session(&self, session_id: &str) -> Result<u64, ControllerError> {
        let removed = self.store.delete_session(session_id).await?;
        info!("[{}] session deleted ({} chunks)", session_id, removed);
        Ok(removed)
    }

    /// Age-based retention pass.
    pub async fn cleanup_old_chunks(&self, days: u32) -> Result<u64, ControllerError> {
        let removed = self.store.delete_chunks_older_than(days).await?;
        if removed > 0 {
            info!("retention removed {} chunks older than {} days", removed, days);
        }
        Ok(removed)
    }

    pub async fn stats(&self, session_id: Option<&str>) -> Result<StoreStats, ControllerError> {
        Ok(self.store.stats(session_id).await?)
    }
}
