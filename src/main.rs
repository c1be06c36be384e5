use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use steno::configuration::config::Config;
use steno::controller::controller_handler::Controller;
use steno::storage::database_storage::DatabaseStorage;
use steno::storage::storage_trait::ChunkStore;
use steno::uploader::presign::HttpPresignService;
use steno::uploader::scheduler::UploadScheduler;
use steno::uploader::transport::HttpTransport;

#[derive(Parser)]
#[command(name = "steno")]
#[command(version = "0.1.0")]
#[command(about = "Durable audio-chunk buffering and resilient upload daemon")]
struct Args {
    config_file: String,
    /// Bearer credential for the presign endpoint. Overrides the config
    /// file when set.
    #[arg(long, env = "STENO_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,
}

#[tokio::main]
async fn main() {
    // Example how to log
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
███████╗████████╗███████╗███╗   ██╗ ██████╗
██╔════╝╚══██╔══╝██╔════╝████╗  ██║██╔═══██╗
███████╗   ██║   █████╗  ██╔██╗ ██║██║   ██║
╚════██║   ██║   ██╔══╝  ██║╚██╗██║██║   ██║
███████║   ██║   ███████╗██║ ╚████║╚██████╔╝
╚══════╝   ╚═╝   ╚══════╝╚═╝  ╚═══╝ ╚═════╝
==============================================================================
          Durable chunk buffering and resilient upload daemon v0.1.0
==============================================================================
"
    );

    info!("Importing configuration");

    // Get command-line arguments
    let args = Args::parse();

    let mut config = match Config::from_file(Path::new(args.config_file.as_str())) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    if args.bearer_token.is_some() {
        config.api.bearer_token = args.bearer_token;
    }

    info!("Configuration imported successfully");

    let store: Arc<dyn ChunkStore> = match DatabaseStorage::open(
        &config.store.db_path,
        config.store.max_store_bytes,
    )
    .await
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Unable to open the chunk store: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let attempt_timeout = Duration::from_secs(config.uploader.transmit_timeout_secs);
    let presign = match HttpPresignService::new(&config.api, attempt_timeout) {
        Ok(presign) => presign,
        Err(e) => {
            error!("Unable to create the presign client: {}, exiting...", e);
            std::process::exit(1);
        }
    };
    let transport = match HttpTransport::new(attempt_timeout) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Unable to create the upload transport: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(UploadScheduler::new(
        &config.uploader,
        Arc::clone(&store),
        Arc::new(presign),
        Arc::new(transport),
    ));
    let controller = Controller::new(&config, Arc::clone(&store), Arc::clone(&scheduler));

    match controller.cleanup_old_chunks(config.store.retention_days).await {
        Ok(removed) if removed > 0 => info!("Retention pass removed {} chunks", removed),
        Ok(_) => {}
        Err(e) => warn!("Retention pass failed: {}", e),
    }
    match controller.recover().await {
        Ok(requeued) if requeued > 0 => {
            info!("Recovered {} uploads interrupted by the last shutdown", requeued)
        }
        Ok(_) => {}
        Err(e) => {
            error!("Startup recovery sweep failed: {}, exiting...", e);
            std::process::exit(1);
        }
    }

    info!("Spawning the upload scheduler");
    let runner = tokio::spawn(Arc::clone(&scheduler).run());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for the shutdown signal: {}", e);
    }
    info!("Shutdown signal received, draining in-flight uploads");
    scheduler.shutdown();
    if let Err(e) = runner.await {
        error!("Error joining at the end of execution: {:?}", e);
        std::process::exit(1);
    }

    match controller.stats(None).await {
        Ok(stats) => match serde_json::to_string_pretty(&stats) {
            Ok(snapshot) => info!("Store state at shutdown:\n{}", snapshot),
            Err(e) => warn!("Could not serialize the stats snapshot: {}", e),
        },
        Err(e) => warn!("Could not read the stats snapshot: {}", e),
    }
}
