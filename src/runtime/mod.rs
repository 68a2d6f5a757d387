// Container runtime client: trait seam + Docker implementation

mod docker;

pub use docker::DockerRuntime;

use crate::models::Container;
use async_trait::async_trait;
use bollard::models::ContainerStatsResponse;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime call timed out after {0:?}")]
    Timeout(Duration),
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    #[error("decode stats: {0}")]
    Decode(String),
    #[error("stats payload missing {0}")]
    MissingField(&'static str),
}

/// Operations the agent needs from the container engine.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// All containers; stopped ones too when `include_stopped`.
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<Container>, RuntimeError>;

    /// One non-streaming stats read. The engine fills `precpu_stats` so a single
    /// response carries both sides of the CPU delta.
    async fn container_stats(&self, id: &str) -> Result<ContainerStatsResponse, RuntimeError>;

    /// Health-check status (e.g. "healthy"), `None` when the container has no health check.
    async fn container_health(&self, id: &str) -> Result<Option<String>, RuntimeError>;
}
