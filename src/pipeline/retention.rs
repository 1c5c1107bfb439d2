use crate::clock::Clock;
use crate::store::{run_blocking, CallStore};
use tokio::task::JoinHandle;

/// Delete expired calls on a separate task.
pub fn spawn_prune(store: CallStore, retention: chrono::Duration, clock: Clock) -> JoinHandle<()> {
    tokio::spawn(async move {
        let now = clock();
        match run_blocking(move || store.prune_at(retention, now)).await {
            Ok(0) => log::debug!("🧹 Prune: nothing older than {}h", retention.num_hours()),
            Ok(deleted) => log::info!("🧹 Pruned {} calls older than {}h", deleted, retention.num_hours()),
            Err(e) => log::error!("❌ Prune failed: {}", e),
        }
    })
}
