// Scheduled VACUUM + WAL checkpoint on a cron expression (local time).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::store::MetricStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawns the scheduler. Returns `None` when no schedule is configured.
pub fn spawn(
    store: Arc<MetricStore>,
    schedule: Option<String>,
    cancel: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    let expr = schedule?;
    Some(tokio::spawn(async move {
        run(store, &expr, cancel).await;
    }))
}

async fn run(store: Arc<MetricStore>, expr: &str, cancel: CancellationToken) {
    let Ok(schedule) = cron::Schedule::from_str(expr) else {
        warn!(cron = %expr, "invalid vacuum_schedule; VACUUM will not run");
        return;
    };
    info!(cron = %expr, "maintenance scheduler started");
    loop {
        let now = chrono::Local::now();
        let delay = match schedule.after(&now).next() {
            Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
            None => Duration::from_secs(3600),
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        run_once(&store).await;
    }
    info!("maintenance scheduler stopped");
}

/// VACUUM, then truncate the WAL. Failures are logged only.
pub async fn run_once(store: &MetricStore) {
    if let Err(e) = store.vacuum().await {
        warn!(error = %e, operation = "vacuum", "vacuum failed");
        return;
    }
    if let Err(e) = store.checkpoint().await {
        warn!(error = %e, operation = "checkpoint", "wal checkpoint failed");
        return;
    }
    info!("vacuum complete");
}
