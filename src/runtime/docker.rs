// Docker over the unix socket via bollard

use super::{RuntimeClient, RuntimeError};
use crate::models::{Container, ContainerState};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use bollard::models::ContainerStatsResponse;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::instrument;

pub struct DockerRuntime {
    docker: Docker,
    timeout: Duration,
}

impl DockerRuntime {
    pub fn connect(socket: &str, timeout: Duration) -> anyhow::Result<Self> {
        let docker =
            Docker::connect_with_socket(socket, timeout.as_secs(), bollard::API_DEFAULT_VERSION)?;
        Ok(Self { docker, timeout })
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, RuntimeError>
    where
        F: std::future::Future<Output = Result<T, RuntimeError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RuntimeError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    #[instrument(skip(self), fields(repo = "docker", operation = "list_containers"))]
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<Container>, RuntimeError> {
        let options = ListContainersOptions {
            all: include_stopped,
            ..Default::default()
        };
        let summaries = self
            .with_timeout(async {
                Ok(self.docker.list_containers(Some(options)).await?)
            })
            .await?;

        Ok(summaries
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(Container {
                    id,
                    image: c.image.unwrap_or_default(),
                    names: c.names.unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                    state: c
                        .state
                        .map_or(ContainerState::Unknown, |s| {
                            ContainerState::from_docker(&s.to_string())
                        }),
                })
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = "docker", operation = "container_stats"))]
    async fn container_stats(&self, id: &str) -> Result<ContainerStatsResponse, RuntimeError> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        self.with_timeout(async {
            let mut stream = self.docker.stats(id, Some(options));
            match stream.next().await {
                Some(result) => Ok(result?),
                None => Err(RuntimeError::Decode("empty stats response".into())),
            }
        })
        .await
    }

    #[instrument(skip(self), fields(repo = "docker", operation = "container_health"))]
    async fn container_health(&self, id: &str) -> Result<Option<String>, RuntimeError> {
        let inspect = self
            .with_timeout(async {
                Ok(self
                    .docker
                    .inspect_container(id, None::<InspectContainerOptions>)
                    .await?)
            })
            .await?;
        Ok(inspect
            .state
            .and_then(|s| s.health)
            .and_then(|h| h.status)
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty() && s != "none"))
    }
}
