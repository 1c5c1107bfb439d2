//! Last-Heard Runtime
//!
//! Wires the whole service together:
//! - Opens the SQLite database and applies `sql/` migrations
//! - Imports the talkgroup and geography reference CSVs
//! - Connects to the Brandmeister feed and spawns the single writer task
//! - Spawns the 10s broadcast scheduler
//! - Serves `/ws` subscribers and the admin API until CTRL+C
//!
//! Usage:
//!   cargo run --release --bin lastheard_runtime
//!
//! Configuration comes from the environment (and `.env`); see `lastheard::config`.

use dotenv::dotenv;
use lastheard::aggregate::AggregationEngine;
use lastheard::api::{create_router, run_server, AdminAuth, AppState};
use lastheard::feed::{CallDetailHandler, CallRecord, FeedClient, IngestStats};
use lastheard::hub::Hub;
use lastheard::pipeline::{broadcast_scheduler_task, start_ingestion, IngestionSettings};
use lastheard::reference::load_reference_data;
use lastheard::store::Database;
use lastheard::{system_clock, RuntimeConfig};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let config = RuntimeConfig::from_env()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log)).init();

    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        warn!("⚠️  rustls crypto provider already installed");
    }

    info!("🚀 Brandmeister Last-Heard Runtime");

    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Feed: {}{} (event: {})", config.feed.url, config.feed.path, config.feed.event);
    info!("   ├─ Listen: {}", config.bind_addr);
    info!("   ├─ Channel buffer: {} calls", config.channel_buffer);
    info!("   ├─ Retention: {}h (prune every {} inserts)", config.retention_hours, config.prune_every_inserts);
    info!("   ├─ Broadcast interval: {}s", config.broadcast_interval_secs);
    info!("   └─ Admin API: {}", if config.admin.is_some() { "enabled" } else { "disabled" });

    info!("🔧 Initializing database...");
    let db = Database::open(&config.db_path, &config.schema_dir, config.read_pool_size)?;

    let directory = db.directory();
    load_reference_data(&directory, &config.talkgroups_csv, &config.geography_csv).await;

    let clock = system_clock();
    let engine = AggregationEngine::new(db.readers(), directory.clone(), clock.clone());
    let hub = Arc::new(Hub::new(engine));
    let stats = Arc::new(IngestStats::default());

    let (tx, rx) = mpsc::channel::<CallRecord>(config.channel_buffer);
    info!("✅ Call channel created (buffer: {})", config.channel_buffer);

    info!("🚀 Spawning background tasks...");

    let ingestion = tokio::spawn(start_ingestion(
        rx,
        db.calls(),
        hub.clone(),
        IngestionSettings::from_config(&config, clock.clone()),
        stats.clone(),
    ));
    info!("   ├─ ✅ Ingestion writer spawned");

    let scheduler = tokio::spawn(broadcast_scheduler_task(hub.clone(), config.broadcast_interval_secs));
    info!("   ├─ ✅ Broadcast scheduler spawned");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(CallDetailHandler::new(config.feed.event.clone(), tx, stats.clone(), clock));
    let feed = FeedClient::new(&config.feed).on(handler);
    let feed_task = tokio::spawn(async move { feed.run(shutdown_rx).await });
    info!("   └─ ✅ Feed client spawned");

    let state = AppState {
        hub,
        directory,
        auth: config.admin.as_ref().map(|credentials| Arc::new(AdminAuth::new(credentials))),
    };
    let router = create_router(state, &config.client_url);

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let server_shutdown = shutdown_tx.clone();
    let shutdown_signal = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
            Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
        }
        let _ = server_shutdown.send(true);
    };

    if let Err(e) = run_server(config.bind_addr, router, shutdown_signal).await {
        error!("❌ HTTP server failed: {}", e);
        let _ = shutdown_tx.send(true);
    }

    // Feed stops first; dropping its handler closes the channel and lets the writer drain.
    if let Err(e) = feed_task.await {
        error!("❌ Feed task failed: {}", e);
    }
    scheduler.abort();

    match tokio::time::timeout(tokio::time::Duration::from_secs(5), ingestion).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("❌ Ingestion task failed: {}", e),
        Err(_) => warn!("⚠️  Ingestion writer did not drain within 5s"),
    }

    let snapshot = stats.snapshot();
    info!(
        "📊 Final stats: received={} persisted={} dropped={} malformed={} failed={}",
        snapshot.received, snapshot.persisted, snapshot.dropped, snapshot.malformed, snapshot.persist_failed
    );
    info!("✅ Last-Heard runtime stopped");
    Ok(())
}
