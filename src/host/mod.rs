// Host CPU / memory / root filesystem via sysinfo

use crate::models::VirtualMemory;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::{Disks, System};
use tracing::instrument;

/// Instantaneous host readings used by the collector and the push snapshot.
#[async_trait]
pub trait HostMetrics: Send + Sync {
    /// Global CPU utilisation, 0-100.
    async fn cpu_percent(&self) -> anyhow::Result<f64>;

    async fn virtual_memory(&self) -> anyhow::Result<VirtualMemory>;

    /// Used percentage of the filesystem mounted at `/`.
    async fn root_filesystem_usage(&self) -> anyhow::Result<f64>;
}

pub struct SysinfoHost {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    last_cpu_refresh: Arc<Mutex<Option<(Instant, f64)>>>,
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoHost {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            last_cpu_refresh: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl HostMetrics for SysinfoHost {
    #[instrument(skip(self), fields(repo = "host", operation = "cpu_percent"))]
    async fn cpu_percent(&self) -> anyhow::Result<f64> {
        let sys = self.sys.clone();
        let last_cpu_refresh = self.last_cpu_refresh.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            let mut last = last_cpu_refresh
                .lock()
                .map_err(|e| anyhow::anyhow!("cpu cache lock poisoned: {}", e))?;

            let now = Instant::now();
            let cached = *last;
            let usage = match cached {
                // Too soon for sysinfo to produce a meaningful delta: reuse the last value.
                Some((prev_ts, prev_usage))
                    if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                {
                    prev_usage
                }
                _ => {
                    sys.refresh_cpu_all();
                    let usage = sys.global_cpu_usage() as f64;
                    *last = Some((now, usage));
                    usage
                }
            };
            Ok(usage.clamp(0.0, 100.0))
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "host", operation = "virtual_memory"))]
    async fn virtual_memory(&self) -> anyhow::Result<VirtualMemory> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_memory();

            let total = sys.total_memory();
            let available = sys.available_memory();
            let used = total.saturating_sub(available);
            Ok(VirtualMemory {
                total,
                available,
                used,
                used_percent: round2(percent_of(used, total)),
                free: sys.free_memory(),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "host", operation = "root_filesystem_usage"))]
    async fn root_filesystem_usage(&self) -> anyhow::Result<f64> {
        let disks = self.disks.clone();
        tokio::task::spawn_blocking(move || {
            let mut disks = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks.refresh(true);
            let root = disks
                .list()
                .iter()
                .find(|d| d.mount_point() == Path::new("/"))
                .ok_or_else(|| anyhow::anyhow!("no filesystem mounted at /"))?;
            let total = root.total_space();
            let used = total.saturating_sub(root.available_space());
            Ok(percent_of(used, total))
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent_of(10, 0), 0.0);
        assert_eq!(percent_of(25, 100), 25.0);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(0.0), 0.0);
    }
}
