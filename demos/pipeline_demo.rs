use async_trait::async_trait;
use bytes::Bytes;
use env_logger::Env;
use log::{info, warn};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use steno::configuration::config::Config;
use steno::controller::controller_handler::Controller;
use steno::error_handling::types::{PresignError, TransportError};
use steno::storage::database_storage::DatabaseStorage;
use steno::storage::storage_trait::ChunkStore;
use steno::uploader::presign::{PresignService, UploadTarget};
use steno::uploader::scheduler::UploadScheduler;
use steno::uploader::transport::{ChunkTransport, ProgressObserver};

/// Issues "targets" that point into a local directory, standing in for the
/// real presign backend.
struct DirectoryPresign {
    root: PathBuf,
}

#[async_trait]
impl PresignService for DirectoryPresign {
    async fn request_target(
        &self,
        session_id: &str,
        seq: u32,
        _content_type: &str,
    ) -> Result<UploadTarget, PresignError> {
        let remote_key = format!("users/demo/audio/sessions/{}/chunk-{:03}.webm", session_id, seq);
        let path = self.root.join(remote_key.replace('/', "_"));
        Ok(UploadTarget {
            target_url: path.display().to_string(),
            remote_key,
            expires_in_secs: 300,
        })
    }
}

/// "Transmits" chunk bytes by writing them to the target path.
struct DirectoryTransport;

#[async_trait]
impl ChunkTransport for DirectoryTransport {
    async fn send(
        &self,
        target: &UploadTarget,
        _content_type: &str,
        payload: Bytes,
        on_progress: ProgressObserver<'_>,
    ) -> Result<(), TransportError> {
        tokio::fs::write(&target.target_url, &payload)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        on_progress(payload.len() as u64);
        Ok(())
    }
}

/// A buffer that begins like a WebM/EBML container and is padded to `len`.
fn webm_segment(len: usize) -> Vec<u8> {
    let mut buf = vec![0x1A, 0x45, 0xDF, 0xA3];
    buf.resize(len, 0x42);
    buf
}

#[tokio::main]
async fn main() {
    // Initialize logger (RUST_LOG can override; default to info)
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    // Choose an output directory for the store and the delivered chunks
    let out_dir: PathBuf = env::var("PIPELINE_DEMO_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            env::current_dir()
                .expect("cwd")
                .join("target")
                .join("pipeline_demo")
        });
    fs::create_dir_all(&out_dir).expect("create output dir");

    let mut config = Config::default();
    config.store.db_path = out_dir.join("pipeline_demo.sqlite3");
    info!("Using chunk store at {}", config.store.db_path.display());

    let store: Arc<dyn ChunkStore> = Arc::new(
        DatabaseStorage::open(&config.store.db_path, config.store.max_store_bytes)
            .await
            .expect("open chunk store"),
    );
    let scheduler = Arc::new(UploadScheduler::new(
        &config.uploader,
        Arc::clone(&store),
        Arc::new(DirectoryPresign {
            root: out_dir.clone(),
        }),
        Arc::new(DirectoryTransport),
    ));
    let controller = Controller::new(&config, Arc::clone(&store), Arc::clone(&scheduler));

    // Anything a previous demo run left mid-flight goes back in line
    let requeued = controller.recover().await.expect("recovery sweep");
    if requeued > 0 {
        info!("Requeued {} uploads from a previous run", requeued);
    }
    let runner = tokio::spawn(Arc::clone(&scheduler).run());

    // Record a short session: four valid segments and one header-only stub
    let session = controller
        .start_session(None, "demo-user")
        .await
        .expect("start session");
    info!("Recording session {}", session);

    for seq in 1..=4u32 {
        controller
            .ingest_segment(&session, seq, &webm_segment(32_000), "audio/webm", 4000)
            .await
            .expect("ingest segment");
        info!("Segment {} admitted and buffered", seq);
    }
    match controller
        .ingest_segment(&session, 5, &webm_segment(120), "audio/webm", 0)
        .await
    {
        Ok(()) => warn!("Header-only stub was admitted unexpectedly"),
        Err(e) => info!("Header-only stub rejected as intended: {}", e),
    }

    // Wait for the queue to drain, then stop
    loop {
        let stats = controller.stats(Some(&session)).await.expect("stats");
        if stats.uploaded == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    controller.complete_session(&session).await.expect("complete session");
    scheduler.shutdown();
    runner.await.expect("join scheduler");

    let stats = controller.stats(None).await.expect("stats");
    info!(
        "Store state -> total={} bytes={} pending={} uploaded={} failed={}",
        stats.total_chunks, stats.total_bytes, stats.pending, stats.uploaded, stats.failed
    );
    info!("Demo complete. Delivered chunks are under: {}", out_dir.display());
}
