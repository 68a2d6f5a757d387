// Collector: one sampling cycle per tick.
// Host sample + container fan-out share one timestamp, land in one transaction,
// then every table is swept. Cycles run inline so two never overlap; ticks that
// fire while a cycle is still running are dropped.

use crate::fanout::{self, FanOutConfig};
use crate::host::HostMetrics;
use crate::runtime::RuntimeClient;
use crate::store::{CycleBatch, MetricStore, unix_millis_now};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval: Duration,
    pub retention_days: u32,
    pub retention_floor: u32,
    pub fanout: FanOutConfig,
}

impl CollectorConfig {
    pub fn from_app(config: &crate::config::AppConfig) -> Self {
        let c = &config.collector;
        Self {
            interval: Duration::from_secs(c.interval_secs),
            retention_days: c.retention_days,
            retention_floor: c.retention_floor,
            fanout: FanOutConfig {
                workers: c.workers,
                call_timeout: Duration::from_millis(c.stats_timeout_ms),
                name_label: c.name_label.clone(),
            },
        }
    }
}

/// What one cycle did. Failures inside the cycle are counted, not returned.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub time: i64,
    pub host_sampled: bool,
    pub containers_sampled: usize,
    pub container_errors: usize,
    /// Rows written; `None` when the transaction failed and the cycle was discarded.
    pub rows_written: Option<usize>,
    pub rows_swept: u64,
}

pub struct Collector {
    host: Arc<dyn HostMetrics>,
    runtime: Arc<dyn RuntimeClient>,
    store: Arc<MetricStore>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        host: Arc<dyn HostMetrics>,
        runtime: Arc<dyn RuntimeClient>,
        store: Arc<MetricStore>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            host,
            runtime,
            store,
            config,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Tick until `cancel` fires. A cycle in progress when cancellation is observed
    /// is abandoned; its uncommitted transaction rolls back.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            retention_days = self.config.retention_days,
            floor = self.config.retention_floor,
            "collector started"
        );
        let mut tick = interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            let started = Instant::now();
            let cycle = AssertUnwindSafe(self.run_cycle(unix_millis_now())).catch_unwind();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("collector cancelled mid-cycle");
                    break;
                }
                outcome = cycle => {
                    match outcome {
                        Ok(report) => debug!(
                            time = report.time,
                            containers = report.containers_sampled,
                            errors = report.container_errors,
                            rows = ?report.rows_written,
                            swept = report.rows_swept,
                            "cycle complete"
                        ),
                        Err(_) => warn!(operation = "collect", "cycle panicked; continuing with next tick"),
                    }
                }
            }

            let elapsed = started.elapsed();
            if elapsed > self.config.interval {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = self.config.interval.as_millis() as u64,
                    "cycle overran its interval; missed ticks dropped"
                );
            }
        }
        info!("collector stopped");
    }

    /// One full cycle at capture time `now_ms`.
    pub async fn run_cycle(&self, now_ms: i64) -> CycleReport {
        let mut report = CycleReport {
            time: now_ms,
            ..Default::default()
        };
        let mut batch = CycleBatch {
            time: now_ms,
            ..Default::default()
        };

        match self.host.cpu_percent().await {
            Ok(p) => batch.host_cpu = Some(p),
            Err(e) => warn!(error = %e, time = now_ms, operation = "host_cpu", "host cpu sample failed"),
        }
        match self.host.virtual_memory().await {
            Ok(m) => batch.host_memory = Some(m),
            Err(e) => {
                warn!(error = %e, time = now_ms, operation = "host_memory", "host memory sample failed")
            }
        }
        report.host_sampled = batch.host_cpu.is_some() && batch.host_memory.is_some();

        match self.runtime.list_containers(true).await {
            Ok(containers) => {
                let result =
                    fanout::collect_stats(self.runtime.clone(), &containers, &self.config.fanout)
                        .await;
                for e in &result.errors {
                    warn!(error = %e, time = now_ms, operation = "container_stats", "container skipped this cycle");
                }
                report.container_errors = result.errors.len();
                report.containers_sampled = result.samples.len();
                batch.containers = result.samples;
            }
            Err(e) => {
                warn!(error = %e, time = now_ms, operation = "list_containers", "container list failed")
            }
        }

        match self.store.commit_cycle(&batch).await {
            Ok(n) => report.rows_written = Some(n),
            Err(e) => {
                warn!(error = %e, time = now_ms, operation = "commit_cycle", "cycle discarded");
            }
        }

        report.rows_swept = self
            .store
            .sweep_all(
                self.config.retention_days,
                self.config.retention_floor,
                now_ms,
            )
            .await
            .total_deleted();
        report
    }
}
