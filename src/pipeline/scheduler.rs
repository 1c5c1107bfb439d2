//! Periodic re-push of every subscriber's Top-N or histogram view

use crate::hub::Hub;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Runs until the task is aborted.
pub async fn broadcast_scheduler_task(hub: Arc<Hub>, interval_secs: u64) {
    log::info!("⏰ Starting broadcast scheduler (interval: {}s)", interval_secs);

    let mut timer = interval(Duration::from_secs(interval_secs.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; subscribers already got a result on selection.
    timer.tick().await;

    loop {
        timer.tick().await;

        if hub.subscriber_count() == 0 {
            continue;
        }

        let started = std::time::Instant::now();
        let refresh_hub = hub.clone();
        match tokio::spawn(async move { refresh_hub.refresh_all().await }).await {
            Ok(pushed) => log::debug!(
                "📡 Broadcast: {} pushes in {}ms",
                pushed,
                started.elapsed().as_millis()
            ),
            Err(e) => log::error!("❌ Broadcast refresh failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregationEngine, TimeRange};
    use crate::clock::system_clock;
    use crate::hub::{ClientRequest, ServerPush};
    use crate::store::test_support::open_test_db;

    #[tokio::test]
    async fn test_scheduler_repushes_selection() {
        let (_dir, db) = open_test_db();
        let hub = Arc::new(Hub::new(AggregationEngine::new(db.readers(), db.directory(), system_clock())));
        let mut sub = hub.register();

        hub.handle_request(
            sub.id,
            ClientRequest::GetGroupedData { time_range: TimeRange::Min5, continent: None, country: None },
        )
        .await;
        assert!(matches!(sub.outbound.recv().await, Some(ServerPush::GroupedData(_))));

        let task = tokio::spawn(broadcast_scheduler_task(hub.clone(), 1));
        let push = tokio::time::timeout(Duration::from_secs(5), sub.outbound.recv()).await;
        task.abort();

        assert!(matches!(push, Ok(Some(ServerPush::GroupedData(rows))) if rows.is_empty()));
    }
}
