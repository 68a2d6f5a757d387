// Push service: on its own interval, POST the container list and root disk usage
// to the control plane. Best effort: failures are logged and the next tick tries again.

use crate::fanout::DEFAULT_MAX_WORKERS;
use crate::host::HostMetrics;
use crate::models::{Container, ContainerReport, FilesystemUsage, PushSnapshot};
use crate::runtime::RuntimeClient;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Health reported for a container without a health check.
pub const HEALTH_NONE: &str = "unhealthy";
/// Health reported when inspecting the container failed.
pub const HEALTH_UNKNOWN: &str = "unknown";

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    pub token: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl PushConfig {
    pub fn from_app(config: &crate::config::AppConfig) -> Self {
        Self {
            url: config.push.url(),
            token: config.server.token.clone(),
            interval: Duration::from_secs(config.push.interval_secs),
            timeout: Duration::from_secs(config.push.timeout_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("building snapshot: {0}")]
    Snapshot(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

pub struct PushService {
    host: Arc<dyn HostMetrics>,
    runtime: Arc<dyn RuntimeClient>,
    client: reqwest::Client,
    config: PushConfig,
}

impl PushService {
    pub fn new(
        host: Arc<dyn HostMetrics>,
        runtime: Arc<dyn RuntimeClient>,
        config: PushConfig,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(crate::version::user_agent())
            .build()?;
        Ok(Self {
            host,
            runtime,
            client,
            config,
        })
    }

    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!(url = %self.config.url, interval_secs = self.config.interval.as_secs(), "push service started");
        let mut tick = interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; wait one full interval before the first push.
        tick.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.push_once() => {
                    if let Err(e) = r {
                        warn!(error = %e, operation = "push", "push failed");
                    }
                }
            }
        }
        info!("push service stopped");
    }

    /// Build one snapshot and deliver it.
    #[instrument(skip(self), fields(operation = "push_once", url = %self.config.url))]
    pub async fn push_once(&self) -> Result<(), PushError> {
        let snapshot = self.build_snapshot().await?;
        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.token)
            .json(&snapshot)
            .send()
            .await
            .map_err(|source| PushError::Transport {
                url: self.config.url.clone(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Status {
                url: self.config.url.clone(),
                status,
                body,
            });
        }
        debug!(containers = snapshot.containers.len(), "snapshot pushed");
        Ok(())
    }

    /// Container list (stopped ones included) plus root filesystem usage. A failed
    /// list fails the snapshot; a failed inspect only marks that container's health.
    /// Inspects run concurrently, bounded, and keep the list order.
    pub async fn build_snapshot(&self) -> Result<PushSnapshot, PushError> {
        let containers = self
            .runtime
            .list_containers(true)
            .await
            .map_err(|e| PushError::Snapshot(e.to_string()))?;
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let time = stamp.as_str();
        let reports: Vec<ContainerReport> = stream::iter(containers)
            .map(|container| async move {
                let health = self.health_of(&container.id).await;
                report(container, time, health)
            })
            .buffered(DEFAULT_MAX_WORKERS)
            .collect()
            .await;

        let used = match self.host.root_filesystem_usage().await {
            Ok(pct) => pct,
            Err(e) => {
                warn!(error = %e, operation = "root_filesystem_usage", "disk usage unavailable");
                0.0
            }
        };

        Ok(PushSnapshot {
            containers: reports,
            filesystem_usage_root: FilesystemUsage {
                used_percentage: whole_percent(used),
            },
        })
    }

    async fn health_of(&self, id: &str) -> String {
        match self.runtime.container_health(id).await {
            Ok(Some(status)) => status,
            Ok(None) => HEALTH_NONE.to_string(),
            Err(e) => {
                warn!(error = %e, container = %id, operation = "container_health", "inspect failed");
                HEALTH_UNKNOWN.to_string()
            }
        }
    }
}

fn report(container: Container, time: &str, health_status: String) -> ContainerReport {
    ContainerReport {
        time: time.to_string(),
        name: container.display_name(),
        id: container.id,
        image: container.image,
        state: container.state,
        labels: container.labels,
        health_status,
    }
}

/// Truncated integer percentage as a string, clamped to 0-100.
pub fn whole_percent(pct: f64) -> String {
    if !pct.is_finite() {
        return "0".to_string();
    }
    format!("{}", pct.clamp(0.0, 100.0).trunc() as u32)
}
