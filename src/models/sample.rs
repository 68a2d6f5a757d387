// Time-series rows. `time` is milliseconds since the Unix epoch (UTC).

use serde::{Deserialize, Serialize};

/// Point-in-time host memory reading, before it is stamped with a cycle time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    #[serde(rename = "usedPercent")]
    pub used_percent: f64,
    pub free: u64,
}

impl VirtualMemory {
    pub fn at(self, time: i64) -> HostMemorySample {
        HostMemorySample {
            time,
            total: self.total,
            available: self.available,
            used: self.used,
            used_percent: self.used_percent,
            free: self.free,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostCpuSample {
    pub time: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostMemorySample {
    pub time: i64,
    pub total: u64,
    pub available: u64,
    pub used: u64,
    #[serde(rename = "usedPercent")]
    pub used_percent: f64,
    pub free: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerCpuSample {
    pub time: i64,
    pub container_id: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMemorySample {
    pub time: i64,
    pub container_id: String,
    pub total: u64,
    pub available: u64,
    pub used: u64,
    #[serde(rename = "usedPercent")]
    pub used_percent: f64,
    pub free: u64,
}
