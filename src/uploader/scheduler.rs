//! Bounded-concurrency upload scheduler.
//!
//! Pulls eligible chunks from the durable store, acquires a delivery target
//! from the presign collaborator, transmits the bytes and writes the
//! outcome back with exponential backoff on failure. The store is the
//! single source of truth for chunk state: a chunk is marked `uploading`
//! before any I/O starts, which atomically removes it from the eligible set
//! and guarantees at most one in-flight attempt per chunk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout};

use crate::configuration::types::UploaderSettings;
use crate::error_handling::types::{StorageError, UploadError};
use crate::storage::storage_trait::ChunkStore;
use crate::storage::types::{ChunkRef, StoreStats};

use super::presign::PresignService;
use super::transport::ChunkTransport;
use super::types::{RetryPolicy, UploadEvent};

/// Upper bound on eligible chunks pulled per scheduling pass.
const DISPATCH_BATCH: u32 = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives pending and retryable chunks to the uploaded state.
///
/// Owns its concurrency-slot semaphore and all scheduling state; nothing
/// here is ambient or static. `pause`/`resume` stop and restart dispatch of
/// new work, in-flight attempts always complete naturally. Network
/// availability gates dispatch the same way through [`set_online`].
///
/// [`set_online`]: UploadScheduler::set_online
pub struct UploadScheduler {
    store: Arc<dyn ChunkStore>,
    presign: Arc<dyn PresignService>,
    transport: Arc<dyn ChunkTransport>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    max_concurrent: usize,
    slots: Arc<Semaphore>,
    paused: AtomicBool,
    offline: AtomicBool,
    stopping: AtomicBool,
    wake: Notify,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadScheduler {
    pub fn new(
        settings: &UploaderSettings,
        store: Arc<dyn ChunkStore>,
        presign: Arc<dyn PresignService>,
        transport: Arc<dyn ChunkTransport>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            presign,
            transport,
            policy: RetryPolicy::from_settings(settings),
            attempt_timeout: Duration::from_secs(settings.transmit_timeout_secs),
            max_concurrent: settings.max_concurrent,
            slots: Arc::new(Semaphore::new(settings.max_concurrent)),
            paused: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            wake: Notify::new(),
            events,
        }
    }

    /// Subscribes to the upload event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Nudges the scheduler about a chunk that is ready for delivery.
    ///
    /// Terminal failures are refused: they only move again through a manual
    /// requeue.
    pub async fn enqueue(&self, session_id: &str, seq: u32) -> Result<(), UploadError> {
        let chunk = self
            .store
            .get_chunk(session_id, seq)
            .await?
            .ok_or(UploadError::Storage(StorageError::NotFound))?;
        if chunk.is_terminal_failure() {
            return Err(UploadError::RetriesExhausted);
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Stops pulling new work. In-flight uploads complete naturally.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("upload scheduler paused");
    }

    /// Resumes dispatch and reschedules immediately.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        info!("upload scheduler resumed");
    }

    /// Network-availability signal; offline gates dispatch exactly like
    /// [`pause`](UploadScheduler::pause).
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
        if online {
            self.wake.notify_one();
            info!("network regained, upload dispatch resumes");
        } else {
            info!("network lost, upload dispatch held");
        }
    }

    /// Stops the scheduling loop. In-flight attempts are awaited by
    /// [`run`](UploadScheduler::run) before it returns.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub async fn stats(&self, session_id: Option<&str>) -> Result<StoreStats, StorageError> {
        self.store.stats(session_id).await
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst) || self.offline.load(Ordering::SeqCst)
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// The scheduling loop. Runs until [`shutdown`](UploadScheduler::shutdown).
    pub async fn run(self: Arc<Self>) {
        info!(
            "upload scheduler started ({} upload slots)",
            self.max_concurrent
        );
        'outer: loop {
            if self.is_stopping() {
                break;
            }
            let notified = self.wake.notified();
            if self.is_paused() {
                notified.await;
                continue;
            }

            let now = Utc::now();
            let batch = match self.store.list_eligible(now, DISPATCH_BATCH).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("eligibility query failed: {}", e);
                    sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if batch.is_empty() {
                // Sleep until the next scheduled retry, or until something
                // new arrives.
                match self.store.next_retry_at(now).await {
                    Ok(Some(at)) => {
                        let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::select! {
                            _ = notified => {}
                            _ = sleep(wait) => {}
                        }
                    }
                    Ok(None) => notified.await,
                    Err(e) => {
                        error!("retry-time query failed: {}", e);
                        sleep(Duration::from_secs(1)).await;
                    }
                }
                continue;
            }

            for item in batch {
                if self.is_stopping() || self.is_paused() {
                    continue 'outer;
                }
                let permit = match Arc::clone(&self.slots).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break 'outer,
                };
                // A pause may have landed while waiting for a free slot.
                if self.is_stopping() || self.is_paused() {
                    drop(permit);
                    continue 'outer;
                }
                match self.store.mark_uploading(&item.session_id, item.seq).await {
                    Ok(()) => {}
                    Err(StorageError::Conflict) => continue,
                    Err(e) => {
                        error!(
                            "[{}] could not claim chunk {}: {}",
                            item.session_id, item.seq, e
                        );
                        continue;
                    }
                }
                debug!(
                    "[{}] dispatching chunk {} ({} bytes, attempt {})",
                    item.session_id,
                    item.seq,
                    item.size_bytes,
                    item.attempt_count + 1
                );
                let _ = self.events.send(UploadEvent::Started {
                    session_id: item.session_id.clone(),
                    seq: item.seq,
                });
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move { scheduler.attempt(item, permit).await });
            }
        }

        // Wait for in-flight attempts before declaring the loop stopped.
        let _ = self.slots.acquire_many(self.max_concurrent as u32).await;
        info!("upload scheduler stopped");
    }

    /// One delivery attempt; the permit is held for its whole duration.
    async fn attempt(self: Arc<Self>, item: ChunkRef, permit: OwnedSemaphorePermit) {
        match self.try_upload(&item).await {
            Ok(remote_key) => {
                if let Err(e) = self
                    .store
                    .mark_uploaded(&item.session_id, item.seq, &remote_key)
                    .await
                {
                    error!(
                        "[{}] chunk {} uploaded but state update failed: {}",
                        item.session_id, item.seq, e
                    );
                } else {
                    info!(
                        "[{}] chunk {} uploaded as {}",
                        item.session_id, item.seq, remote_key
                    );
                    let _ = self.events.send(UploadEvent::Completed {
                        session_id: item.session_id.clone(),
                        seq: item.seq,
                        remote_key,
                    });
                }
            }
            Err(err) => {
                let attempts = item.attempt_count + 1;
                let terminal = attempts >= self.policy.max_retries;
                let retry_at = if terminal {
                    None
                } else {
                    let delay = self.policy.delay_for(item.attempt_count);
                    Some(Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64))
                };
                if terminal {
                    warn!(
                        "[{}] chunk {} failed permanently after {} attempts: {}",
                        item.session_id, item.seq, attempts, err
                    );
                } else {
                    warn!(
                        "[{}] chunk {} attempt {} failed, next retry at {:?}: {}",
                        item.session_id, item.seq, attempts, retry_at, err
                    );
                }
                if let Err(e) = self
                    .store
                    .mark_failed(&item.session_id, item.seq, &err.to_string(), retry_at)
                    .await
                {
                    error!(
                        "[{}] chunk {} failure could not be recorded: {}",
                        item.session_id, item.seq, e
                    );
                }
                let _ = self.events.send(UploadEvent::Failed {
                    session_id: item.session_id.clone(),
                    seq: item.seq,
                    error: err.to_string(),
                    next_retry_at: retry_at,
                    terminal,
                });
            }
        }
        drop(permit);
        self.wake.notify_one();
    }

    async fn try_upload(&self, item: &ChunkRef) -> Result<String, UploadError> {
        // Payload bytes are borrowed from the store only for the duration
        // of this attempt.
        let chunk = self
            .store
            .get_chunk(&item.session_id, item.seq)
            .await?
            .ok_or(UploadError::Storage(StorageError::NotFound))?;

        let target = timeout(
            self.attempt_timeout,
            self.presign
                .request_target(&item.session_id, item.seq, &chunk.content_type),
        )
        .await
        .map_err(|_| UploadError::TargetAcquisitionFailed("timed out".to_string()))?
        .map_err(|e| UploadError::TargetAcquisitionFailed(e.to_string()))?;

        let payload = Bytes::from(chunk.payload);
        let events = self.events.clone();
        let session_id = item.session_id.clone();
        let seq = item.seq;
        let on_progress = move |bytes_sent: u64| {
            let _ = events.send(UploadEvent::Progress {
                session_id: session_id.clone(),
                seq,
                bytes_sent,
            });
        };
        timeout(
            self.attempt_timeout,
            self.transport
                .send(&target, &chunk.content_type, payload, &on_progress),
        )
        .await
        .map_err(|_| UploadError::TransmitFailed("timed out".to_string()))?
        .map_err(|e| UploadError::TransmitFailed(e.to_string()))?;

        Ok(target.remote_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::{PresignError, TransportError};
    use crate::storage::database_storage::DatabaseStorage;
    use crate::storage::types::{Chunk, ChunkState};
    use crate::uploader::presign::UploadTarget;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicUsize};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    struct MockPresign;

    #[async_trait]
    impl PresignService for MockPresign {
        async fn request_target(
            &self,
            session_id: &str,
            seq: u32,
            _content_type: &str,
        ) -> Result<UploadTarget, PresignError> {
            Ok(UploadTarget {
                target_url: format!("mem://bucket/{}/{}", session_id, seq),
                remote_key: format!(
                    "users/u1/audio/sessions/{}/chunk-{:03}.webm",
                    session_id, seq
                ),
                expires_in_secs: 300,
            })
        }
    }

    struct FailingPresign;

    #[async_trait]
    impl PresignService for FailingPresign {
        async fn request_target(
            &self,
            _session_id: &str,
            _seq: u32,
            _content_type: &str,
        ) -> Result<UploadTarget, PresignError> {
            Err(PresignError::Unauthorized)
        }
    }

    #[derive(Default)]
    struct MockTransport {
        delay_ms: u64,
        fail_first: AtomicU32,
        sends: AtomicU32,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        active: StdMutex<HashSet<String>>,
        overlapped: AtomicBool,
    }

    impl MockTransport {
        fn instant() -> Self {
            Self::default()
        }

        fn with_delay(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::default()
            }
        }

        fn failing(times: u32) -> Self {
            Self {
                fail_first: AtomicU32::new(times),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ChunkTransport for MockTransport {
        async fn send(
            &self,
            target: &UploadTarget,
            _content_type: &str,
            payload: Bytes,
            on_progress: crate::uploader::transport::ProgressObserver<'_>,
        ) -> Result<(), TransportError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
            if !self
                .active
                .lock()
                .unwrap()
                .insert(target.remote_key.clone())
            {
                self.overlapped.store(true, Ordering::SeqCst);
            }

            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            let result = if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                Err(TransportError::Status(503))
            } else {
                on_progress(payload.len() as u64);
                Ok(())
            };

            self.active.lock().unwrap().remove(&target.remote_key);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    async fn temp_store() -> Arc<dyn ChunkStore> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scheduler.sqlite3");
        // Keep TempDir alive by leaking it for the test duration
        Box::leak(Box::new(dir));
        Arc::new(DatabaseStorage::open(path, u64::MAX).await.unwrap())
    }

    fn fast_settings() -> UploaderSettings {
        UploaderSettings {
            max_concurrent: 3,
            max_retries: 5,
            base_delay_ms: 10,
            max_delay_ms: 50,
            transmit_timeout_secs: 5,
        }
    }

    fn start(
        settings: &UploaderSettings,
        store: Arc<dyn ChunkStore>,
        presign: Arc<dyn PresignService>,
        transport: Arc<dyn ChunkTransport>,
    ) -> (Arc<UploadScheduler>, tokio::task::JoinHandle<()>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let scheduler = Arc::new(UploadScheduler::new(settings, store, presign, transport));
        let handle = tokio::spawn(Arc::clone(&scheduler).run());
        (scheduler, handle)
    }

    async fn seed_chunks(store: &Arc<dyn ChunkStore>, session: &str, count: u32, size: usize) {
        store.create_session(session, "u1").await.unwrap();
        for seq in 1..=count {
            store
                .put_chunk(session, seq, &vec![0x55; size], "audio/webm", 4000)
                .await
                .unwrap();
        }
    }

    async fn wait_for_chunk<F>(
        store: &Arc<dyn ChunkStore>,
        session: &str,
        seq: u32,
        what: &str,
        pred: F,
    ) -> Chunk
    where
        F: Fn(&Chunk) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(chunk) = store.get_chunk(session, seq).await.unwrap() {
                if pred(&chunk) {
                    return chunk;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {}",
                what
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn uploads_a_pending_chunk_end_to_end() {
        let store = temp_store().await;
        let transport = Arc::new(MockTransport::instant());
        let (scheduler, handle) = start(
            &fast_settings(),
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::clone(&transport) as Arc<dyn ChunkTransport>,
        );
        let mut events = scheduler.subscribe();

        seed_chunks(&store, "s1", 1, 150_000).await;
        scheduler.enqueue("s1", 1).await.unwrap();

        let chunk = wait_for_chunk(&store, "s1", 1, "upload completion", |c| {
            c.state == ChunkState::Uploaded
        })
        .await;
        assert_eq!(
            chunk.remote_key.as_deref(),
            Some("users/u1/audio/sessions/s1/chunk-001.webm")
        );

        let mut saw_started = false;
        let mut saw_progress = false;
        loop {
            match timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event wait timed out")
                .expect("event stream closed")
            {
                UploadEvent::Started { seq: 1, .. } => saw_started = true,
                UploadEvent::Progress { bytes_sent, .. } => {
                    assert_eq!(bytes_sent, 150_000);
                    saw_progress = true;
                }
                UploadEvent::Completed { remote_key, .. } => {
                    assert!(remote_key.ends_with("chunk-001.webm"));
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(saw_started);
        assert!(saw_progress);

        let session = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.chunks_uploaded, 1);

        scheduler.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn retries_exhaust_into_terminal_failure() {
        let store = temp_store().await;
        let transport = Arc::new(MockTransport::failing(u32::MAX));
        let (scheduler, _handle) = start(
            &fast_settings(),
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::clone(&transport) as Arc<dyn ChunkTransport>,
        );
        let mut events = scheduler.subscribe();

        // Sequence numbers may have gaps; start this session at 2.
        store.create_session("s1", "u1").await.unwrap();
        store
            .put_chunk("s1", 2, &vec![0x55; 1500], "audio/webm", 4000)
            .await
            .unwrap();
        scheduler.enqueue("s1", 2).await.unwrap();

        let chunk = wait_for_chunk(&store, "s1", 2, "terminal failure", |c| {
            c.is_terminal_failure()
        })
        .await;
        assert_eq!(chunk.attempt_count, 5);
        assert!(chunk
            .last_error
            .as_deref()
            .unwrap()
            .contains("Transmit failed"));

        let mut failures = Vec::new();
        while failures.len() < 5 {
            if let UploadEvent::Failed {
                next_retry_at,
                terminal,
                ..
            } = timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event wait timed out")
                .expect("event stream closed")
            {
                failures.push((next_retry_at, terminal));
            }
        }
        // Four scheduled retries, then the terminal park.
        for (retry_at, terminal) in &failures[..4] {
            assert!(retry_at.is_some());
            assert!(!terminal);
        }
        assert_eq!(failures[4], (None, true));

        // Past every computed backoff delay, nothing re-attempts it.
        let sends_after_terminal = transport.sends.load(Ordering::SeqCst);
        assert_eq!(sends_after_terminal, 5);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(transport.sends.load(Ordering::SeqCst), sends_after_terminal);
        let chunk = store.get_chunk("s1", 2).await.unwrap().unwrap();
        assert_eq!(chunk.attempt_count, 5);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_bound() {
        let store = temp_store().await;
        let transport = Arc::new(MockTransport::with_delay(50));
        let (scheduler, _handle) = start(
            &fast_settings(),
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::clone(&transport) as Arc<dyn ChunkTransport>,
        );

        seed_chunks(&store, "s1", 6, 1500).await;
        scheduler.enqueue("s1", 1).await.unwrap();

        for seq in 1..=6u32 {
            wait_for_chunk(&store, "s1", seq, "all uploads to finish", |c| {
                c.state == ChunkState::Uploaded
            })
            .await;
        }

        assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 3);
        // No chunk ever had two transmits running at once.
        assert!(!transport.overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn pause_holds_new_dispatch_until_resume() {
        let store = temp_store().await;
        let transport = Arc::new(MockTransport::with_delay(150));
        let settings = UploaderSettings {
            max_concurrent: 2,
            ..fast_settings()
        };
        let (scheduler, _handle) = start(
            &settings,
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::clone(&transport) as Arc<dyn ChunkTransport>,
        );
        let mut events = scheduler.subscribe();

        seed_chunks(&store, "s1", 5, 1500).await;
        scheduler.enqueue("s1", 1).await.unwrap();

        // Chunks 1 and 2 occupy both slots; pause before 3 can start.
        let mut started = 0;
        while started < 2 {
            if let UploadEvent::Started { .. } = timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event wait timed out")
                .expect("event stream closed")
            {
                started += 1;
            }
        }
        scheduler.pause();

        for seq in [1u32, 2] {
            wait_for_chunk(&store, "s1", seq, "in-flight uploads to finish", |c| {
                c.state == ChunkState::Uploaded
            })
            .await;
        }
        // Give the loop ample room to (incorrectly) dispatch more.
        sleep(Duration::from_millis(400)).await;
        for seq in [3u32, 4, 5] {
            let chunk = store.get_chunk("s1", seq).await.unwrap().unwrap();
            assert_eq!(chunk.state, ChunkState::Pending, "chunk {} moved while paused", seq);
        }

        scheduler.resume();
        for seq in [3u32, 4, 5] {
            wait_for_chunk(&store, "s1", seq, "resumed uploads to finish", |c| {
                c.state == ChunkState::Uploaded
            })
            .await;
        }
    }

    #[tokio::test]
    async fn offline_gates_dispatch_like_pause() {
        let store = temp_store().await;
        let transport = Arc::new(MockTransport::instant());
        let (scheduler, _handle) = start(
            &fast_settings(),
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::clone(&transport) as Arc<dyn ChunkTransport>,
        );

        scheduler.set_online(false);
        seed_chunks(&store, "s1", 2, 1500).await;
        scheduler.enqueue("s1", 1).await.unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
        let stats = scheduler.stats(Some("s1")).await.unwrap();
        assert_eq!(stats.pending, 2);

        scheduler.set_online(true);
        for seq in [1u32, 2] {
            wait_for_chunk(&store, "s1", seq, "uploads after reconnect", |c| {
                c.state == ChunkState::Uploaded
            })
            .await;
        }
    }

    #[tokio::test]
    async fn presign_failure_counts_as_an_attempt() {
        let store = temp_store().await;
        let settings = UploaderSettings {
            max_retries: 2,
            ..fast_settings()
        };
        let (scheduler, _handle) = start(
            &settings,
            Arc::clone(&store),
            Arc::new(FailingPresign),
            Arc::new(MockTransport::instant()),
        );

        seed_chunks(&store, "s1", 1, 1500).await;
        scheduler.enqueue("s1", 1).await.unwrap();

        let chunk = wait_for_chunk(&store, "s1", 1, "terminal failure", |c| {
            c.is_terminal_failure()
        })
        .await;
        assert_eq!(chunk.attempt_count, 2);
        assert!(chunk
            .last_error
            .as_deref()
            .unwrap()
            .contains("Failed to obtain delivery target"));
    }

    #[tokio::test]
    async fn enqueue_refuses_terminal_and_missing_chunks() {
        let store = temp_store().await;
        let scheduler = UploadScheduler::new(
            &fast_settings(),
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::new(MockTransport::instant()),
        );

        seed_chunks(&store, "s1", 1, 1500).await;
        store.mark_uploading("s1", 1).await.unwrap();
        store.mark_failed("s1", 1, "boom", None).await.unwrap();

        assert!(matches!(
            scheduler.enqueue("s1", 1).await.unwrap_err(),
            UploadError::RetriesExhausted
        ));
        assert!(matches!(
            scheduler.enqueue("s1", 99).await.unwrap_err(),
            UploadError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn slow_transmit_hits_the_attempt_timeout() {
        let store = temp_store().await;
        let settings = UploaderSettings {
            max_retries: 1,
            transmit_timeout_secs: 1,
            ..fast_settings()
        };
        let (scheduler, _handle) = start(
            &settings,
            Arc::clone(&store),
            Arc::new(MockPresign),
            Arc::new(MockTransport::with_delay(3_000)),
        );

        seed_chunks(&store, "s1", 1, 1500).await;
        scheduler.enqueue("s1", 1).await.unwrap();

        let chunk = wait_for_chunk(&store, "s1", 1, "timeout failure", |c| {
            c.is_terminal_failure()
        })
        .await;
        assert!(chunk.last_error.as_deref().unwrap().contains("timed out"));
    }
}
