use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub collector: CollectorConfig,
    pub push: PushConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Bearer token for the API and for outbound pushes. Required.
    pub token: String,
    pub debug: bool,
    /// How long shutdown waits for background tasks before giving up.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8888".into(),
            token: String::new(),
            debug: false,
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "/app/db/metrics.sqlite".into(),
            vacuum_schedule: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub retention_days: u32,
    /// Minimum rows per table the retention sweep never deletes below.
    pub retention_floor: u32,
    /// Fan-out worker count; `min(10, containers)` when unset.
    pub workers: Option<usize>,
    pub stats_timeout_ms: u64,
    /// Container label whose value overrides the runtime name as the storage key.
    pub name_label: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 5,
            retention_days: 7,
            retention_floor: 10,
            workers: None,
            stats_timeout_ms: 5_000,
            name_label: "coolify.name".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub path: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            path: "/api/v1/sentinel/push".into(),
            interval_secs: 60,
            timeout_secs: 10,
        }
    }
}

impl PushConfig {
    pub fn url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Docker daemon unix socket.
    pub socket: String,
    pub timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket: "/var/run/docker.sock".into(),
            timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load from `CONFIG_FILE` (default `config.toml`; defaults when absent), apply
    /// environment overrides, then validate.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(anyhow::anyhow!("read {}: {}", path, e)),
        };
        let mut config: AppConfig = toml::from_str(&s)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the deployment's environment variables on top of the file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("TOKEN") {
            self.server.token = v;
        }
        if let Some(v) = get("BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = get("DEBUG") {
            self.server.debug = parse_env_bool("DEBUG", &v)?;
        }
        if let Some(v) = get("METRICS_FILE") {
            self.database.path = v;
        }
        if let Some(v) = get("PUSH_ENDPOINT") {
            self.push.endpoint = v;
        }
        if let Some(v) = get("PUSH_PATH") {
            self.push.path = v;
        }
        if let Some(v) = get("PUSH_INTERVAL_SECONDS") {
            self.push.interval_secs = parse_env("PUSH_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = get("COLLECTOR_ENABLED") {
            self.collector.enabled = parse_env_bool("COLLECTOR_ENABLED", &v)?;
        }
        if let Some(v) = get("COLLECTOR_REFRESH_RATE_SECONDS") {
            self.collector.interval_secs = parse_env("COLLECTOR_REFRESH_RATE_SECONDS", &v)?;
        }
        if let Some(v) = get("COLLECTOR_RETENTION_PERIOD_DAYS") {
            self.collector.retention_days = parse_env("COLLECTOR_RETENTION_PERIOD_DAYS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.server.token.is_empty(),
            "server.token (or TOKEN) is required"
        );
        anyhow::ensure!(
            !self.server.bind_addr.is_empty(),
            "server.bind_addr must be non-empty"
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        if let Some(ref schedule) = self.database.vacuum_schedule {
            anyhow::ensure!(
                cron::Schedule::from_str(schedule).is_ok(),
                "database.vacuum_schedule is not a valid cron expression: {}",
                schedule
            );
        }
        anyhow::ensure!(
            self.collector.interval_secs > 0,
            "collector.interval_secs must be > 0, got {}",
            self.collector.interval_secs
        );
        anyhow::ensure!(
            self.collector.retention_days > 0,
            "collector.retention_days must be > 0, got {}",
            self.collector.retention_days
        );
        anyhow::ensure!(
            self.collector.retention_floor > 0,
            "collector.retention_floor must be > 0, got {}",
            self.collector.retention_floor
        );
        anyhow::ensure!(
            self.collector.workers != Some(0),
            "collector.workers must be > 0 when set"
        );
        anyhow::ensure!(
            self.collector.stats_timeout_ms > 0,
            "collector.stats_timeout_ms must be > 0, got {}",
            self.collector.stats_timeout_ms
        );
        if self.push.enabled {
            anyhow::ensure!(
                !self.push.endpoint.is_empty(),
                "push.endpoint (or PUSH_ENDPOINT) is required when push is enabled"
            );
            anyhow::ensure!(
                self.push.interval_secs > 0,
                "push.interval_secs must be > 0, got {}",
                self.push.interval_secs
            );
            anyhow::ensure!(
                self.push.timeout_secs > 0,
                "push.timeout_secs must be > 0, got {}",
                self.push.timeout_secs
            );
        }
        anyhow::ensure!(
            !self.runtime.socket.is_empty(),
            "runtime.socket must be non-empty"
        );
        anyhow::ensure!(
            self.runtime.timeout_secs > 0,
            "runtime.timeout_secs must be > 0, got {}",
            self.runtime.timeout_secs
        );
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", key, value, e))
}

/// Boolean flags accept the same spellings the existing deployment scripts use.
fn parse_env_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => anyhow::bail!("{} has invalid boolean value {:?}", key, other),
    }
}
