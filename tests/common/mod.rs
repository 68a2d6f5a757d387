// Shared test helpers: in-memory runtime and host fakes, tempfile-backed store.
#![allow(dead_code)]

use async_trait::async_trait;
use bollard::models::{
    ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats, ContainerStatsResponse,
};
use sentinel::host::HostMetrics;
use sentinel::models::{Container, ContainerState, VirtualMemory};
use sentinel::runtime::{RuntimeClient, RuntimeError};
use sentinel::store::MetricStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub async fn temp_store() -> (TempDir, Arc<MetricStore>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.sqlite");
    let store = MetricStore::connect(path.to_str().unwrap()).await.unwrap();
    store.init().await.unwrap();
    (dir, Arc::new(store))
}

pub fn container(id: &str, name: &str) -> Container {
    Container {
        id: id.to_string(),
        image: format!("{name}:latest"),
        names: vec![format!("/{name}")],
        labels: HashMap::new(),
        state: ContainerState::Running,
    }
}

/// Stats payload giving 20% CPU (2 cpus) and `used` bytes of a 1000-byte limit.
pub fn stats_response(used: u64) -> ContainerStatsResponse {
    let cpu = |total: u64, system: u64| ContainerCpuStats {
        cpu_usage: Some(ContainerCpuUsage {
            total_usage: Some(total),
            ..Default::default()
        }),
        system_cpu_usage: Some(system),
        online_cpus: Some(2),
        throttling_data: None,
    };
    ContainerStatsResponse {
        cpu_stats: Some(cpu(100, 1000)),
        precpu_stats: Some(cpu(50, 500)),
        memory_stats: Some(ContainerMemoryStats {
            usage: Some(used),
            limit: Some(1000),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
pub enum StatsBehavior {
    Ok,
    Fail,
    /// Answer correctly, but only after this long.
    Delay(Duration),
    /// Payload without memory_stats.
    Malformed,
    Panic,
}

#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Vec<Container>,
    pub behavior: HashMap<String, StatsBehavior>,
    pub health: HashMap<String, Result<Option<String>, String>>,
    pub list_fails: bool,
    pub stats_calls: AtomicUsize,
    /// Added to every health inspect.
    pub health_delay: Option<Duration>,
}

impl FakeRuntime {
    pub fn with_containers(containers: Vec<Container>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn behave(mut self, id: &str, b: StatsBehavior) -> Self {
        self.behavior.insert(id.to_string(), b);
        self
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn list_containers(&self, _include_stopped: bool) -> Result<Vec<Container>, RuntimeError> {
        if self.list_fails {
            return Err(RuntimeError::Unavailable("daemon down".into()));
        }
        Ok(self.containers.clone())
    }

    async fn container_stats(&self, id: &str) -> Result<ContainerStatsResponse, RuntimeError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior.get(id).cloned().unwrap_or(StatsBehavior::Ok) {
            StatsBehavior::Ok => Ok(stats_response(250)),
            StatsBehavior::Fail => Err(RuntimeError::Unavailable(format!("{id} exploded"))),
            StatsBehavior::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(stats_response(250))
            }
            StatsBehavior::Malformed => Ok(ContainerStatsResponse {
                memory_stats: None,
                ..stats_response(250)
            }),
            StatsBehavior::Panic => panic!("stats for {id} blew up"),
        }
    }

    async fn container_health(&self, id: &str) -> Result<Option<String>, RuntimeError> {
        if let Some(d) = self.health_delay {
            tokio::time::sleep(d).await;
        }
        match self.health.get(id) {
            Some(Ok(h)) => Ok(h.clone()),
            Some(Err(e)) => Err(RuntimeError::Unavailable(e.clone())),
            None => Ok(None),
        }
    }
}

pub struct FakeHost {
    pub cpu: Option<f64>,
    pub memory: Option<VirtualMemory>,
    pub root_fs: f64,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            cpu: Some(12.5),
            memory: Some(VirtualMemory {
                total: 8000,
                available: 6000,
                used: 2000,
                used_percent: 25.0,
                free: 5000,
            }),
            root_fs: 42.7,
        }
    }
}

#[async_trait]
impl HostMetrics for FakeHost {
    async fn cpu_percent(&self) -> anyhow::Result<f64> {
        self.cpu.ok_or_else(|| anyhow::anyhow!("cpu unavailable"))
    }

    async fn virtual_memory(&self) -> anyhow::Result<VirtualMemory> {
        self.memory.ok_or_else(|| anyhow::anyhow!("memory unavailable"))
    }

    async fn root_filesystem_usage(&self) -> anyhow::Result<f64> {
        Ok(self.root_fs)
    }
}

/// Panics on the first CPU read, then behaves like [`FakeHost::default`].
#[derive(Default)]
pub struct PanicOnceHost {
    pub inner: FakeHost,
    pub panicked: AtomicBool,
}

#[async_trait]
impl HostMetrics for PanicOnceHost {
    async fn cpu_percent(&self) -> anyhow::Result<f64> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("sensor driver fault");
        }
        self.inner.cpu_percent().await
    }

    async fn virtual_memory(&self) -> anyhow::Result<VirtualMemory> {
        self.inner.virtual_memory().await
    }

    async fn root_filesystem_usage(&self) -> anyhow::Result<f64> {
        self.inner.root_filesystem_usage().await
    }
}
