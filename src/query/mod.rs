// Query facade: validate externally supplied range parameters, then read the store.
// Nothing reaches the database until both bounds and the container id are valid.

use crate::models::{ContainerCpuSample, ContainerMemorySample, HostCpuSample, HostMemorySample};
use crate::store::{MetricStore, Table, TimeRange};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid '{param}' value {value:?}: expected RFC3339 or unix seconds")]
    InvalidTime { param: &'static str, value: String },
    #[error("'from' ({from}) is after 'to' ({to})")]
    InvertedRange { from: i64, to: i64 },
    #[error("invalid container id {0:?}")]
    InvalidContainerId(String),
}

/// Failure of a facade read: bad input, or the store itself.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Parse one bound. Accepts RFC3339 or integer Unix seconds; returns milliseconds.
/// Blank input means "not supplied".
pub fn parse_time_bound(param: &'static str, raw: &str) -> Result<Option<i64>, QueryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return secs
            .checked_mul(1000)
            .map(Some)
            .ok_or_else(|| invalid(param, raw));
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.timestamp_millis()))
        .map_err(|_| invalid(param, raw))
}

fn invalid(param: &'static str, raw: &str) -> QueryError {
    QueryError::InvalidTime {
        param,
        value: raw.to_string(),
    }
}

impl TimeRange {
    /// Resolve optional `from`/`to` parameters. Missing `from` is the epoch; missing
    /// `to` is `now_ms`.
    pub fn parse(from: Option<&str>, to: Option<&str>, now_ms: i64) -> Result<Self, QueryError> {
        let from_ms = match from {
            Some(raw) => parse_time_bound("from", raw)?,
            None => None,
        }
        .unwrap_or(0);
        let to_ms = match to {
            Some(raw) => parse_time_bound("to", raw)?,
            None => None,
        }
        .unwrap_or(now_ms);
        if from_ms > to_ms {
            return Err(QueryError::InvertedRange {
                from: from_ms,
                to: to_ms,
            });
        }
        Ok(Self { from_ms, to_ms })
    }
}

/// Container ids may only contain `[A-Za-z0-9_.-]`.
pub fn sanitize_container_id(raw: &str) -> Result<String, QueryError> {
    let id = raw.trim();
    let ok = !id.is_empty()
        && id.len() <= 255
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if ok {
        Ok(id.to_string())
    } else {
        Err(QueryError::InvalidContainerId(raw.to_string()))
    }
}

/// Read side of the metric store, as the HTTP layer sees it.
pub struct QueryFacade<'a> {
    store: &'a MetricStore,
    now_ms: i64,
}

impl<'a> QueryFacade<'a> {
    pub fn new(store: &'a MetricStore, now_ms: i64) -> Self {
        Self { store, now_ms }
    }

    pub async fn host_cpu(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<HostCpuSample>, ReadError> {
        let range = TimeRange::parse(from, to, self.now_ms)?;
        Ok(self.store.read_host_cpu(range).await?)
    }

    pub async fn host_memory(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<HostMemorySample>, ReadError> {
        let range = TimeRange::parse(from, to, self.now_ms)?;
        Ok(self.store.read_host_memory(range).await?)
    }

    pub async fn container_cpu(
        &self,
        container_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<ContainerCpuSample>, ReadError> {
        let id = sanitize_container_id(container_id)?;
        let range = TimeRange::parse(from, to, self.now_ms)?;
        Ok(self.store.read_container_cpu(&id, range).await?)
    }

    pub async fn container_memory(
        &self,
        container_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<ContainerMemorySample>, ReadError> {
        let id = sanitize_container_id(container_id)?;
        let range = TimeRange::parse(from, to, self.now_ms)?;
        Ok(self.store.read_container_memory(&id, range).await?)
    }

    /// Generic form: any table, container id required for container tables.
    pub async fn read_range(
        &self,
        table: Table,
        from: Option<&str>,
        to: Option<&str>,
        container_id: Option<&str>,
    ) -> Result<Vec<crate::store::Sample>, ReadError> {
        let id = match container_id {
            Some(raw) => Some(sanitize_container_id(raw)?),
            None if table.is_container_scoped() => {
                return Err(QueryError::InvalidContainerId(String::new()).into());
            }
            None => None,
        };
        let range = TimeRange::parse(from, to, self.now_ms)?;
        Ok(self.store.read_range(table, range, id.as_deref()).await?)
    }
}
