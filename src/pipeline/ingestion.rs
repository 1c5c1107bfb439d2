//! Writer task: drains the ingestion channel into the retention store
//!
//! The only task that appends. Each persisted record is published on the
//! hub firehose; every `prune_every_inserts` appends a prune is spawned so
//! the next append never waits on it.

use super::retention::spawn_prune;
use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::feed::{CallRecord, IngestStats, StoredCall};
use crate::hub::Hub;
use crate::store::{run_blocking, CallStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Clone)]
pub struct IngestionSettings {
    pub prune_every_inserts: u64,
    pub retention: chrono::Duration,
    pub stats_interval: Duration,
    pub clock: Clock,
}

impl IngestionSettings {
    pub fn from_config(config: &RuntimeConfig, clock: Clock) -> Self {
        Self {
            prune_every_inserts: config.prune_every_inserts.max(1),
            retention: chrono::Duration::hours(config.retention_hours),
            stats_interval: Duration::from_secs(10),
            clock,
        }
    }
}

/// Run until every sender of `rx` is dropped.
pub async fn start_ingestion(
    mut rx: mpsc::Receiver<CallRecord>,
    store: CallStore,
    hub: Arc<Hub>,
    settings: IngestionSettings,
    stats: Arc<IngestStats>,
) {
    log::info!("🚀 Starting call ingestion");
    log::info!("   ├─ Prune every: {} inserts", settings.prune_every_inserts);
    log::info!("   ├─ Retention: {}h", settings.retention.num_hours());
    log::info!("   └─ Waiting for calls...");

    let mut stats_timer = interval(settings.stats_interval);
    stats_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_prune = 0u64;
    let mut appended = 0u64;
    let mut last_log_time = std::time::Instant::now();

    loop {
        tokio::select! {
            maybe_record = rx.recv() => {
                let Some(record) = maybe_record else {
                    break;
                };

                let destination = record.destination_id;
                let writer = store.clone();
                let result = run_blocking(move || {
                    let id = writer.append(&record)?;
                    Ok(StoredCall { id, record })
                })
                .await;

                match result {
                    Ok(call) => {
                        stats.record_persisted();
                        hub.publish(&call);
                        appended += 1;

                        since_prune += 1;
                        if since_prune >= settings.prune_every_inserts {
                            since_prune = 0;
                            spawn_prune(store.clone(), settings.retention, settings.clock.clone());
                        }
                    }
                    Err(e) => {
                        stats.record_persist_failed();
                        log::error!("❌ Failed to persist call to destination {:?}: {}", destination, e);
                    }
                }
            }

            _ = stats_timer.tick() => {
                let elapsed = last_log_time.elapsed().as_secs_f64();
                if appended > 0 && elapsed > 0.0 {
                    log::info!(
                        "📊 Ingestion rate: {:.1} calls/sec ({} in last {:.0}s)",
                        appended as f64 / elapsed,
                        appended,
                        elapsed
                    );
                }

                let snapshot = stats.snapshot();
                log::debug!(
                    "📈 Ingest stats: received={} malformed={} dropped={} queued={} backpressure={} persisted={} failed={}",
                    snapshot.received,
                    snapshot.malformed,
                    snapshot.dropped,
                    snapshot.queued,
                    snapshot.backpressure,
                    snapshot.persisted,
                    snapshot.persist_failed
                );

                let capacity = rx.max_capacity();
                let usage = capacity - rx.capacity();
                if usage > capacity / 2 {
                    log::warn!("⚠️  Ingestion channel usage high: {}/{}", usage, capacity);
                }

                appended = 0;
                last_log_time = std::time::Instant::now();
            }
        }
    }

    log::info!("✅ Ingestion stopped (channel closed)");
}
