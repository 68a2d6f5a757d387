// Per-container stats over a bounded worker pool.
// W workers pull from one shared queue; successes and failures come back on
// separate channels. One container failing never affects its siblings.

mod stats;

pub use stats::cpu_percent;

use crate::models::{Container, ContainerSample};
use crate::runtime::{RuntimeClient, RuntimeError};
use futures_util::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

/// Worker bound when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Debug, Clone)]
pub struct FanOutConfig {
    pub workers: Option<usize>,
    /// Deadline for each stats call; a miss counts as that container's failure.
    pub call_timeout: Duration,
    /// Label that overrides the runtime name as the storage key.
    pub name_label: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FanOutError {
    #[error("container {container}: {source}")]
    Stats {
        container: String,
        #[source]
        source: RuntimeError,
    },
    #[error("container {container}: stats call panicked")]
    Panicked { container: String },
    #[error("container {container}: not processed, worker pool aborted")]
    Unprocessed { container: String },
    #[error("stats worker aborted: {0}")]
    Worker(String),
}

/// Outcome of one fan-out. Partial results are normal.
#[derive(Debug, Default)]
pub struct FanOutResult {
    /// Sorted by container name.
    pub samples: Vec<ContainerSample>,
    pub errors: Vec<FanOutError>,
}

struct Job {
    id: String,
    name: String,
}

/// `configured` (or [`DEFAULT_MAX_WORKERS`]) capped by the number of containers.
pub fn worker_count(configured: Option<usize>, containers: usize) -> usize {
    configured
        .unwrap_or(DEFAULT_MAX_WORKERS)
        .max(1)
        .min(containers)
}

/// Fetch and decode stats for every container. Returns once the queue is drained.
#[instrument(skip_all, fields(operation = "collect_stats", containers = containers.len()))]
pub async fn collect_stats(
    runtime: Arc<dyn RuntimeClient>,
    containers: &[Container],
    config: &FanOutConfig,
) -> FanOutResult {
    let workers = worker_count(config.workers, containers.len());
    if workers == 0 {
        return FanOutResult::default();
    }

    let queue: VecDeque<Job> = containers
        .iter()
        .map(|c| Job {
            id: c.id.clone(),
            name: c.persistence_name(&config.name_label),
        })
        .collect();
    let queue = Arc::new(Mutex::new(queue));
    let (sample_tx, mut sample_rx) = mpsc::channel::<ContainerSample>(containers.len());
    let (error_tx, mut error_rx) = mpsc::channel::<FanOutError>(containers.len());

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let queue = queue.clone();
        let runtime = runtime.clone();
        let sample_tx = sample_tx.clone();
        let error_tx = error_tx.clone();
        let call_timeout = config.call_timeout;
        pool.spawn(async move {
            while let Some(job) = next_job(&queue) {
                let fetched = AssertUnwindSafe(fetch_one(runtime.as_ref(), &job, call_timeout))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(FanOutError::Panicked {
                            container: job.name.clone(),
                        })
                    });
                match fetched {
                    Ok(sample) => {
                        let _ = sample_tx.send(sample).await;
                    }
                    Err(e) => {
                        let _ = error_tx.send(e).await;
                    }
                }
            }
        });
    }
    drop(sample_tx);
    drop(error_tx);

    let mut result = FanOutResult::default();
    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            result.errors.push(FanOutError::Worker(e.to_string()));
        }
    }
    // Only reachable if every worker died; whatever is left still gets reported.
    while let Some(job) = next_job(&queue) {
        result
            .errors
            .push(FanOutError::Unprocessed { container: job.name });
    }
    while let Some(sample) = sample_rx.recv().await {
        result.samples.push(sample);
    }
    while let Some(err) = error_rx.recv().await {
        result.errors.push(err);
    }
    result.samples.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(
        workers,
        succeeded = result.samples.len(),
        failed = result.errors.len(),
        "fan-out complete"
    );
    result
}

fn next_job(queue: &Mutex<VecDeque<Job>>) -> Option<Job> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

async fn fetch_one(
    runtime: &dyn RuntimeClient,
    job: &Job,
    call_timeout: Duration,
) -> Result<ContainerSample, FanOutError> {
    let response = tokio::time::timeout(call_timeout, runtime.container_stats(&job.id))
        .await
        .map_err(|_| RuntimeError::Timeout(call_timeout))
        .and_then(|r| r)
        .map_err(|source| FanOutError::Stats {
            container: job.name.clone(),
            source,
        })?;
    stats::process_statistics(&response, &job.name).map_err(|source| FanOutError::Stats {
        container: job.name.clone(),
        source,
    })
}
