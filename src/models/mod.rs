// Domain models: persisted samples, transient containers, push snapshot

mod container;
mod sample;
mod snapshot;

pub use container::{Container, ContainerSample, ContainerState};
pub use sample::{
    ContainerCpuSample, ContainerMemorySample, HostCpuSample, HostMemorySample, VirtualMemory,
};
pub use snapshot::{ContainerReport, FilesystemUsage, PushSnapshot};
