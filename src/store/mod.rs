// SQLite time series for host and container CPU/memory samples.
// Sole writer of samples; the HTTP layer only reads.

mod table;

pub use table::Table;

use crate::models::{
    ContainerCpuSample, ContainerMemorySample, ContainerSample, HostCpuSample, HostMemorySample,
    VirtualMemory,
};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::{instrument, warn};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current time in milliseconds since the Unix epoch (UTC).
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Inclusive time window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from_ms: i64,
    pub to_ms: i64,
}

/// One row of any table.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    HostCpu(HostCpuSample),
    HostMemory(HostMemorySample),
    ContainerCpu(ContainerCpuSample),
    ContainerMemory(ContainerMemorySample),
}

impl Sample {
    pub fn table(&self) -> Table {
        match self {
            Sample::HostCpu(_) => Table::CpuUsage,
            Sample::HostMemory(_) => Table::MemoryUsage,
            Sample::ContainerCpu(_) => Table::ContainerCpuUsage,
            Sample::ContainerMemory(_) => Table::ContainerMemoryUsage,
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            Sample::HostCpu(s) => s.time,
            Sample::HostMemory(s) => s.time,
            Sample::ContainerCpu(s) => s.time,
            Sample::ContainerMemory(s) => s.time,
        }
    }
}

/// Everything one collector cycle persists. All rows share `time`.
#[derive(Debug, Clone, Default)]
pub struct CycleBatch {
    pub time: i64,
    pub host_cpu: Option<f64>,
    pub host_memory: Option<VirtualMemory>,
    pub containers: Vec<ContainerSample>,
}

impl CycleBatch {
    pub fn samples(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(2 + self.containers.len() * 2);
        if let Some(percent) = self.host_cpu {
            out.push(Sample::HostCpu(HostCpuSample {
                time: self.time,
                percent,
            }));
        }
        if let Some(memory) = self.host_memory {
            out.push(Sample::HostMemory(memory.at(self.time)));
        }
        for c in &self.containers {
            out.push(Sample::ContainerCpu(c.cpu_row(self.time)));
            out.push(Sample::ContainerMemory(c.memory_row(self.time)));
        }
        out
    }
}

/// Rows removed from each table by one retention pass.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub deleted: Vec<(Table, u64)>,
    pub failed: Vec<Table>,
}

impl SweepReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

pub struct MetricStore {
    pool: SqlitePool,
}

impl MetricStore {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        for table in Table::ALL {
            sqlx::query(table.create_sql()).execute(&self.pool).await?;
            if let Some(index) = table.index_sql() {
                sqlx::query(index).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    /// Insert one row, replacing any row with the same key.
    #[instrument(skip(self, sample), fields(repo = "metrics", operation = "write", table = %sample.table(), time = sample.time()))]
    pub async fn write(&self, sample: &Sample) -> anyhow::Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut conn, sample).await
    }

    /// Persist a whole cycle in one transaction: every row lands or none does.
    /// Statements are prepared once per connection and reused across the batch.
    #[instrument(skip(self, batch), fields(repo = "metrics", operation = "commit_cycle", time = batch.time, containers = batch.containers.len()))]
    pub async fn commit_cycle(&self, batch: &CycleBatch) -> anyhow::Result<usize> {
        let samples = batch.samples();
        if samples.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for sample in &samples {
            upsert(&mut tx, sample).await?;
        }
        tx.commit().await?;
        Ok(samples.len())
    }

    /// Rows of `table` within `range`, ascending by time. Container tables require
    /// `container_id`.
    pub async fn read_range(
        &self,
        table: Table,
        range: TimeRange,
        container_id: Option<&str>,
    ) -> anyhow::Result<Vec<Sample>> {
        match (table, container_id) {
            (Table::CpuUsage, _) => Ok(self
                .read_host_cpu(range)
                .await?
                .into_iter()
                .map(Sample::HostCpu)
                .collect()),
            (Table::MemoryUsage, _) => Ok(self
                .read_host_memory(range)
                .await?
                .into_iter()
                .map(Sample::HostMemory)
                .collect()),
            (Table::ContainerCpuUsage, Some(id)) => Ok(self
                .read_container_cpu(id, range)
                .await?
                .into_iter()
                .map(Sample::ContainerCpu)
                .collect()),
            (Table::ContainerMemoryUsage, Some(id)) => Ok(self
                .read_container_memory(id, range)
                .await?
                .into_iter()
                .map(Sample::ContainerMemory)
                .collect()),
            (table, None) => Err(anyhow::anyhow!("{} reads require a container id", table)),
        }
    }

    #[instrument(skip(self), fields(repo = "metrics", operation = "read_host_cpu"))]
    pub async fn read_host_cpu(&self, range: TimeRange) -> anyhow::Result<Vec<HostCpuSample>> {
        let rows = sqlx::query(Table::CpuUsage.select_range_sql())
            .bind(range.from_ms)
            .bind(range.to_ms)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(host_cpu_row).collect()
    }

    #[instrument(skip(self), fields(repo = "metrics", operation = "read_host_memory"))]
    pub async fn read_host_memory(
        &self,
        range: TimeRange,
    ) -> anyhow::Result<Vec<HostMemorySample>> {
        let rows = sqlx::query(Table::MemoryUsage.select_range_sql())
            .bind(range.from_ms)
            .bind(range.to_ms)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(host_memory_row).collect()
    }

    #[instrument(skip(self), fields(repo = "metrics", operation = "read_container_cpu"))]
    pub async fn read_container_cpu(
        &self,
        container_id: &str,
        range: TimeRange,
    ) -> anyhow::Result<Vec<ContainerCpuSample>> {
        let rows = sqlx::query(Table::ContainerCpuUsage.select_range_sql())
            .bind(range.from_ms)
            .bind(range.to_ms)
            .bind(container_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(container_cpu_row).collect()
    }

    #[instrument(skip(self), fields(repo = "metrics", operation = "read_container_memory"))]
    pub async fn read_container_memory(
        &self,
        container_id: &str,
        range: TimeRange,
    ) -> anyhow::Result<Vec<ContainerMemorySample>> {
        let rows = sqlx::query(Table::ContainerMemoryUsage.select_range_sql())
            .bind(range.from_ms)
            .bind(range.to_ms)
            .bind(container_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(container_memory_row).collect()
    }

    pub async fn count(&self, table: Table) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(table.count_sql())
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Delete rows older than `retention_days` before `now_ms`, never touching the
    /// `floor` most recent timestamps and never running when the table holds
    /// `floor` rows or fewer. Returns rows deleted.
    #[instrument(skip(self), fields(repo = "metrics", operation = "sweep"))]
    pub async fn sweep(
        &self,
        table: Table,
        retention_days: u32,
        floor: u32,
        now_ms: i64,
    ) -> anyhow::Result<u64> {
        let cutoff = now_ms - i64::from(retention_days) * MS_PER_DAY;
        let mut tx = self.pool.begin().await?;
        let total = sqlx::query_scalar::<_, i64>(table.count_sql())
            .fetch_one(&mut *tx)
            .await?;
        if total <= i64::from(floor) {
            return Ok(0);
        }
        let r = sqlx::query(table.sweep_sql())
            .bind(cutoff)
            .bind(i64::from(floor))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(r.rows_affected())
    }

    /// Sweep every table. A failing table is logged and skipped.
    pub async fn sweep_all(&self, retention_days: u32, floor: u32, now_ms: i64) -> SweepReport {
        let mut report = SweepReport::default();
        for table in Table::ALL {
            match self.sweep(table, retention_days, floor, now_ms).await {
                Ok(n) => report.deleted.push((table, n)),
                Err(e) => {
                    warn!(error = %e, table = %table, operation = "sweep", "retention sweep failed");
                    report.failed.push(table);
                }
            }
        }
        report
    }

    /// Reclaim space after deletes.
    #[instrument(skip(self), fields(repo = "metrics", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Fold the WAL back into the main database file.
    #[instrument(skip(self), fields(repo = "metrics", operation = "checkpoint"))]
    pub async fn checkpoint(&self) -> anyhow::Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn row_counts(&self) -> anyhow::Result<Vec<(Table, i64)>> {
        let mut out = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            out.push((table, self.count(table).await?));
        }
        Ok(out)
    }
}

async fn upsert(conn: &mut sqlx::SqliteConnection, sample: &Sample) -> anyhow::Result<()> {
    let sql = sample.table().upsert_sql();
    let query = match sample {
        Sample::HostCpu(s) => sqlx::query(sql).bind(s.time).bind(s.percent),
        Sample::HostMemory(s) => sqlx::query(sql)
            .bind(s.time)
            .bind(s.total as i64)
            .bind(s.available as i64)
            .bind(s.used as i64)
            .bind(s.used_percent)
            .bind(s.free as i64),
        Sample::ContainerCpu(s) => sqlx::query(sql)
            .bind(s.time)
            .bind(s.container_id.as_str())
            .bind(s.percent),
        Sample::ContainerMemory(s) => sqlx::query(sql)
            .bind(s.time)
            .bind(s.container_id.as_str())
            .bind(s.total as i64)
            .bind(s.available as i64)
            .bind(s.used as i64)
            .bind(s.used_percent)
            .bind(s.free as i64),
    };
    query.execute(&mut *conn).await?;
    Ok(())
}

fn host_cpu_row(row: &SqliteRow) -> anyhow::Result<HostCpuSample> {
    Ok(HostCpuSample {
        time: row.try_get("time")?,
        percent: numeric_f64(row, "percent")?,
    })
}

fn host_memory_row(row: &SqliteRow) -> anyhow::Result<HostMemorySample> {
    Ok(HostMemorySample {
        time: row.try_get("time")?,
        total: numeric_u64(row, "total")?,
        available: numeric_u64(row, "available")?,
        used: numeric_u64(row, "used")?,
        used_percent: numeric_f64(row, "usedPercent")?,
        free: numeric_u64(row, "free")?,
    })
}

fn container_cpu_row(row: &SqliteRow) -> anyhow::Result<ContainerCpuSample> {
    Ok(ContainerCpuSample {
        time: row.try_get("time")?,
        container_id: row.try_get("container_id")?,
        percent: numeric_f64(row, "percent")?,
    })
}

fn container_memory_row(row: &SqliteRow) -> anyhow::Result<ContainerMemorySample> {
    Ok(ContainerMemorySample {
        time: row.try_get("time")?,
        container_id: row.try_get("container_id")?,
        total: numeric_u64(row, "total")?,
        available: numeric_u64(row, "available")?,
        used: numeric_u64(row, "used")?,
        used_percent: numeric_f64(row, "usedPercent")?,
        free: numeric_u64(row, "free")?,
    })
}

// Numeric columns are decoded by storage class. Rows written by older agents keep
// them as VARCHAR, so text is parsed as a fallback; anything unparsable reads as zero.

fn numeric_f64(row: &SqliteRow, column: &str) -> anyhow::Result<f64> {
    if let Ok(v) = row.try_get::<Option<f64>, _>(column) {
        return Ok(v.filter(|v| v.is_finite()).unwrap_or(0.0));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column) {
        return Ok(v.map(|v| v as f64).unwrap_or(0.0));
    }
    let raw: Option<String> = row.try_get(column)?;
    Ok(parse_f64(raw.as_deref()))
}

fn numeric_u64(row: &SqliteRow, column: &str) -> anyhow::Result<u64> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(column) {
        return Ok(v.and_then(|v| u64::try_from(v).ok()).unwrap_or(0));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column) {
        return Ok(v
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
            .unwrap_or(0));
    }
    let raw: Option<String> = row.try_get(column)?;
    Ok(parse_u64(raw.as_deref()))
}

pub(crate) fn parse_f64(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub(crate) fn parse_u64(raw: Option<&str>) -> u64 {
    let Some(s) = raw.map(str::trim) else {
        return 0;
    };
    s.parse::<u64>()
        .ok()
        .or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_text_values_parse_or_fall_back_to_zero() {
        assert_eq!(parse_f64(Some("12.50")), 12.5);
        assert_eq!(parse_f64(Some(" 3 ")), 3.0);
        assert_eq!(parse_f64(Some("n/a")), 0.0);
        assert_eq!(parse_f64(None), 0.0);
        assert_eq!(parse_u64(Some("1024")), 1024);
        assert_eq!(parse_u64(Some("2048.0")), 2048);
        assert_eq!(parse_u64(Some("-1")), 0);
        assert_eq!(parse_u64(Some("")), 0);
    }

    #[test]
    fn cycle_batch_rows_share_one_time() {
        let batch = CycleBatch {
            time: 42,
            host_cpu: Some(1.0),
            host_memory: Some(VirtualMemory {
                total: 10,
                available: 5,
                used: 5,
                used_percent: 50.0,
                free: 5,
            }),
            containers: vec![ContainerSample {
                name: "web".into(),
                cpu_percent: 2.0,
                memory_used: 1,
                memory_limit: 4,
                memory_percent: 25.0,
            }],
        };
        let samples = batch.samples();
        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.time() == 42));
    }
}
