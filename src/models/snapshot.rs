// Push snapshot wire format (snake_case JSON, as the remote collector expects)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ContainerState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerReport {
    /// RFC3339, second precision.
    pub time: String,
    pub id: String,
    pub image: String,
    pub name: String,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
    pub health_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemUsage {
    /// Whole percent, serialized as a string (e.g. "42").
    pub used_percentage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSnapshot {
    pub containers: Vec<ContainerReport>,
    pub filesystem_usage_root: FilesystemUsage,
}
