// Container models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{ContainerCpuSample, ContainerMemorySample};

/// Length of the short container id used when a container has no name.
const SHORT_ID_LEN: usize = 12;

/// Docker container state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Exited,
    Paused,
    Restarting,
    Removing,
    Dead,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "exited" => ContainerState::Exited,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }
}

/// A container as listed by the runtime. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub id: String,
    pub image: String,
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
    pub state: ContainerState,
}

impl Container {
    /// Runtime-assigned name without the leading '/', or the short id when unnamed.
    pub fn display_name(&self) -> String {
        match self.names.first() {
            Some(n) if !n.trim_start_matches('/').is_empty() => {
                n.trim_start_matches('/').to_string()
            }
            _ => self.short_id().to_string(),
        }
    }

    /// Key the container's samples are stored under: the operator label when set,
    /// else the display name.
    pub fn persistence_name(&self, label_key: &str) -> String {
        match self.labels.get(label_key) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => self.display_name(),
        }
    }

    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map_or(self.id.len(), |(i, _)| i);
        &self.id[..end]
    }
}

/// One container's decoded stats for a cycle. Memory values are bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSample {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_used: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
}

impl ContainerSample {
    pub fn cpu_row(&self, time: i64) -> ContainerCpuSample {
        ContainerCpuSample {
            time,
            container_id: self.name.clone(),
            percent: self.cpu_percent,
        }
    }

    pub fn memory_row(&self, time: i64) -> ContainerMemorySample {
        ContainerMemorySample {
            time,
            container_id: self.name.clone(),
            total: self.memory_limit,
            available: self.memory_limit,
            used: self.memory_used,
            used_percent: self.memory_percent,
            free: self.memory_limit.saturating_sub(self.memory_used),
        }
    }
}
