//! openmic - Karaoke Host Daemon
//!
//! Composition root: wires the song library, worker pool, lifecycle manager,
//! singer rotation, and the JSON-RPC control surface.

mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use openmic_api_rpc::{RpcServer, RpcServerConfig};
use openmic_core::application::pool::constants::{
    BROADCAST_CAPACITY, DEFAULT_PROCESSING_CEILING, DEFAULT_WORKER_SLOTS, WORKER_EVENT_CAPACITY,
};
use openmic_core::application::pool::shutdown_channel;
use openmic_core::application::{
    BroadcastHub, JobLifecycleManager, JobStore, RetentionConfig, RetentionSweeper,
    RotationManager, WorkerPool,
};
use openmic_core::port::{SystemTimeProvider, UuidProvider};
use openmic_infra_media::{CatalogClient, MediaEngine, SubprocessSeparator};
use openmic_infra_sqlite::{create_pool, run_migrations, SqliteSongRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.openmic/library.db";
const DEFAULT_MEDIA_DIR: &str = "~/.openmic/media";
const DEFAULT_SEPARATOR_BIN: &str = "stemsplit";
const DEFAULT_CATALOG_URL: &str = "http://127.0.0.1:7530";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("OPENMIC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("openmic=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("openmic karaoke host v{} starting...", VERSION);

    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let db_path = std::env::var("OPENMIC_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());
    let media_dir = std::env::var("OPENMIC_MEDIA_DIR")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_MEDIA_DIR).into_owned());
    let separator_bin =
        std::env::var("OPENMIC_SEPARATOR_BIN").unwrap_or_else(|_| DEFAULT_SEPARATOR_BIN.to_string());
    let catalog_url =
        std::env::var("OPENMIC_CATALOG_URL").unwrap_or_else(|_| DEFAULT_CATALOG_URL.to_string());

    let rpc_config = match std::env::var("OPENMIC_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(port) => RpcServerConfig {
            port,
            ..Default::default()
        },
        None => RpcServerConfig::default(),
    };

    let worker_slots: usize = std::env::var("OPENMIC_WORKER_SLOTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_WORKER_SLOTS);

    let processing_ceiling = std::env::var("OPENMIC_PROCESSING_CEILING_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_PROCESSING_CEILING);

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let songs = Arc::new(SqliteSongRepository::new(pool.clone()));
    let hub = Arc::new(BroadcastHub::new(BROADCAST_CAPACITY));
    let store = Arc::new(JobStore::new());

    let media_engine = Arc::new(MediaEngine::new(
        SubprocessSeparator::new(&separator_bin),
        CatalogClient::new(&catalog_url),
        &media_dir,
    ));

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(WORKER_EVENT_CAPACITY);
    let worker_pool = Arc::new(WorkerPool::new(
        worker_slots,
        processing_ceiling,
        media_engine,
        events_tx,
    ));

    let lifecycle = Arc::new(JobLifecycleManager::new(
        store.clone(),
        worker_pool,
        hub.clone(),
        songs.clone(),
        id_provider,
        time_provider.clone(),
    ));

    let rotation = Arc::new(RotationManager::new(
        songs,
        hub.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
    ));

    // 5. Start background loops
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    info!("Starting job lifecycle loop...");
    let lifecycle_handle = tokio::spawn(lifecycle.clone().run(events_rx, shutdown_rx));

    info!("Starting retention sweeper...");
    let sweeper = RetentionSweeper::new(store, time_provider, RetentionConfig::default());
    tokio::spawn(sweeper.run(shutdown_tx.token()));

    // 6. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_server = RpcServer::new(rpc_config, lifecycle, rotation, hub);
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Waiting for requests...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(Duration::from_secs(5), lifecycle_handle).await;

    info!("Shutdown complete.");

    Ok(())
}
