// Fixed set of time-series tables and their SQL. No statement is built from a
// runtime identifier; every table's text is a literal here.
//
// `time` is compared through CAST(time AS INTEGER) everywhere: databases created by
// older agents declare it VARCHAR, where a bare comparison would be lexicographic.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    CpuUsage,
    MemoryUsage,
    ContainerCpuUsage,
    ContainerMemoryUsage,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::CpuUsage,
        Table::MemoryUsage,
        Table::ContainerCpuUsage,
        Table::ContainerMemoryUsage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::CpuUsage => "cpu_usage",
            Table::MemoryUsage => "memory_usage",
            Table::ContainerCpuUsage => "container_cpu_usage",
            Table::ContainerMemoryUsage => "container_memory_usage",
        }
    }

    /// Keyed by `(time, container_id)` rather than `time` alone.
    pub fn is_container_scoped(self) -> bool {
        matches!(self, Table::ContainerCpuUsage | Table::ContainerMemoryUsage)
    }

    pub(super) fn create_sql(self) -> &'static str {
        match self {
            Table::CpuUsage => {
                "CREATE TABLE IF NOT EXISTS cpu_usage (
                    time INTEGER NOT NULL,
                    percent REAL NOT NULL,
                    PRIMARY KEY (time)
                )"
            }
            Table::MemoryUsage => {
                "CREATE TABLE IF NOT EXISTS memory_usage (
                    time INTEGER NOT NULL,
                    total INTEGER NOT NULL,
                    available INTEGER NOT NULL,
                    used INTEGER NOT NULL,
                    usedPercent REAL NOT NULL,
                    free INTEGER NOT NULL,
                    PRIMARY KEY (time)
                )"
            }
            Table::ContainerCpuUsage => {
                "CREATE TABLE IF NOT EXISTS container_cpu_usage (
                    time INTEGER NOT NULL,
                    container_id TEXT NOT NULL,
                    percent REAL NOT NULL,
                    PRIMARY KEY (time, container_id)
                )"
            }
            Table::ContainerMemoryUsage => {
                "CREATE TABLE IF NOT EXISTS container_memory_usage (
                    time INTEGER NOT NULL,
                    container_id TEXT NOT NULL,
                    total INTEGER NOT NULL,
                    available INTEGER NOT NULL,
                    used INTEGER NOT NULL,
                    usedPercent REAL NOT NULL,
                    free INTEGER NOT NULL,
                    PRIMARY KEY (time, container_id)
                )"
            }
        }
    }

    pub(super) fn index_sql(self) -> Option<&'static str> {
        match self {
            Table::CpuUsage | Table::MemoryUsage => None,
            Table::ContainerCpuUsage => Some(
                "CREATE INDEX IF NOT EXISTS idx_container_cpu_usage_container_id_time ON container_cpu_usage (container_id, time)",
            ),
            Table::ContainerMemoryUsage => Some(
                "CREATE INDEX IF NOT EXISTS idx_container_memory_usage_container_id_time ON container_memory_usage (container_id, time)",
            ),
        }
    }

    pub(super) fn count_sql(self) -> &'static str {
        match self {
            Table::CpuUsage => "SELECT COUNT(*) FROM cpu_usage",
            Table::MemoryUsage => "SELECT COUNT(*) FROM memory_usage",
            Table::ContainerCpuUsage => "SELECT COUNT(*) FROM container_cpu_usage",
            Table::ContainerMemoryUsage => "SELECT COUNT(*) FROM container_memory_usage",
        }
    }

    /// `?1` = cutoff (ms), `?2` = floor. Keeps the `floor` most recent timestamps
    /// whatever their age; container tables keep whole cycles.
    pub(super) fn sweep_sql(self) -> &'static str {
        match self {
            Table::CpuUsage => {
                "DELETE FROM cpu_usage
                 WHERE CAST(time AS INTEGER) < ?1
                   AND time NOT IN (
                       SELECT time FROM cpu_usage ORDER BY CAST(time AS INTEGER) DESC LIMIT ?2
                   )"
            }
            Table::MemoryUsage => {
                "DELETE FROM memory_usage
                 WHERE CAST(time AS INTEGER) < ?1
                   AND time NOT IN (
                       SELECT time FROM memory_usage ORDER BY CAST(time AS INTEGER) DESC LIMIT ?2
                   )"
            }
            Table::ContainerCpuUsage => {
                "DELETE FROM container_cpu_usage
                 WHERE CAST(time AS INTEGER) < ?1
                   AND time NOT IN (
                       SELECT time FROM container_cpu_usage
                       GROUP BY time ORDER BY CAST(time AS INTEGER) DESC LIMIT ?2
                   )"
            }
            Table::ContainerMemoryUsage => {
                "DELETE FROM container_memory_usage
                 WHERE CAST(time AS INTEGER) < ?1
                   AND time NOT IN (
                       SELECT time FROM container_memory_usage
                       GROUP BY time ORDER BY CAST(time AS INTEGER) DESC LIMIT ?2
                   )"
            }
        }
    }

    pub(super) fn upsert_sql(self) -> &'static str {
        match self {
            Table::CpuUsage => "INSERT OR REPLACE INTO cpu_usage (time, percent) VALUES (?1, ?2)",
            Table::MemoryUsage => {
                "INSERT OR REPLACE INTO memory_usage (time, total, available, used, usedPercent, free)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            }
            Table::ContainerCpuUsage => {
                "INSERT OR REPLACE INTO container_cpu_usage (time, container_id, percent)
                 VALUES (?1, ?2, ?3)"
            }
            Table::ContainerMemoryUsage => {
                "INSERT OR REPLACE INTO container_memory_usage (time, container_id, total, available, used, usedPercent, free)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            }
        }
    }

    /// `?1` = from, `?2` = to (both inclusive); container tables add `?3` = container id.
    pub(super) fn select_range_sql(self) -> &'static str {
        match self {
            Table::CpuUsage => {
                "SELECT CAST(time AS INTEGER) AS time, percent
                 FROM cpu_usage
                 WHERE CAST(time AS INTEGER) BETWEEN ?1 AND ?2
                 ORDER BY CAST(time AS INTEGER) ASC"
            }
            Table::MemoryUsage => {
                "SELECT CAST(time AS INTEGER) AS time, total, available, used, usedPercent, free
                 FROM memory_usage
                 WHERE CAST(time AS INTEGER) BETWEEN ?1 AND ?2
                 ORDER BY CAST(time AS INTEGER) ASC"
            }
            Table::ContainerCpuUsage => {
                "SELECT CAST(time AS INTEGER) AS time, container_id, percent
                 FROM container_cpu_usage
                 WHERE container_id = ?3 AND CAST(time AS INTEGER) BETWEEN ?1 AND ?2
                 ORDER BY CAST(time AS INTEGER) ASC"
            }
            Table::ContainerMemoryUsage => {
                "SELECT CAST(time AS INTEGER) AS time, container_id,
                        total, available, used, usedPercent, free
                 FROM container_memory_usage
                 WHERE container_id = ?3 AND CAST(time AS INTEGER) BETWEEN ?1 AND ?2
                 ORDER BY CAST(time AS INTEGER) ASC"
            }
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
