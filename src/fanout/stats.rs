// Decode a one-shot Docker stats response into a ContainerSample.

use crate::models::ContainerSample;
use crate::runtime::RuntimeError;
use bollard::models::ContainerStatsResponse;

/// `(cpu_delta / system_delta) * online_cpus * 100`, or 0 when the system delta is
/// not positive. Never NaN or infinite.
pub fn cpu_percent(cpu_delta: f64, system_delta: f64, online_cpus: f64) -> f64 {
    if system_delta <= 0.0 || online_cpus <= 0.0 || !cpu_delta.is_finite() {
        return 0.0;
    }
    let pct = (cpu_delta / system_delta) * online_cpus * 100.0;
    if pct.is_finite() { pct.max(0.0) } else { 0.0 }
}

/// Process a raw Docker stats response. Missing CPU or memory sections are decode
/// failures for this container only.
pub(crate) fn process_statistics(
    s: &ContainerStatsResponse,
    name: &str,
) -> Result<ContainerSample, RuntimeError> {
    let cpu_stats = s
        .cpu_stats
        .as_ref()
        .ok_or(RuntimeError::MissingField("cpu_stats"))?;
    let precpu_stats = s
        .precpu_stats
        .as_ref()
        .ok_or(RuntimeError::MissingField("precpu_stats"))?;
    let cpu_usage = cpu_stats
        .cpu_usage
        .as_ref()
        .ok_or(RuntimeError::MissingField("cpu_stats.cpu_usage"))?;
    let memory = s
        .memory_stats
        .as_ref()
        .ok_or(RuntimeError::MissingField("memory_stats"))?;

    // precpu is empty on the very first read of a fresh container; that is a zero delta.
    let pre_total = precpu_stats
        .cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);
    let cpu_delta = cpu_usage.total_usage.unwrap_or(0) as f64 - pre_total as f64;
    let system_delta = cpu_stats.system_cpu_usage.unwrap_or(0) as f64
        - precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
    let online = match cpu_stats.online_cpus {
        Some(n) if n > 0 => n as f64,
        _ => cpu_usage
            .percpu_usage
            .as_ref()
            .map_or(1, |p| p.len().max(1)) as f64,
    };

    let usage = memory.usage.unwrap_or(0);
    let limit = memory.limit.unwrap_or(0);
    // cgroup v1 reports "cache"; cgroup v2 has no such key, its reclaimable part is "inactive_file".
    let cache = memory
        .stats
        .as_ref()
        .and_then(|m| m.get("cache").or_else(|| m.get("inactive_file")).copied())
        .unwrap_or(0);
    let used = usage.saturating_sub(cache);
    let memory_percent = if limit > 0 {
        (used as f64 / limit as f64) * 100.0
    } else {
        0.0
    };

    Ok(ContainerSample {
        name: name.to_string(),
        cpu_percent: cpu_percent(cpu_delta, system_delta, online),
        memory_used: used,
        memory_limit: limit,
        memory_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats};
    use std::collections::HashMap;

    fn minimal_cpu_stats(total_usage: u64, system_cpu_usage: u64) -> ContainerCpuStats {
        ContainerCpuStats {
            cpu_usage: Some(ContainerCpuUsage {
                total_usage: Some(total_usage),
                ..Default::default()
            }),
            system_cpu_usage: Some(system_cpu_usage),
            online_cpus: Some(2),
            throttling_data: None,
        }
    }

    fn memory(usage: u64, limit: u64, stats: &[(&str, u64)]) -> ContainerMemoryStats {
        ContainerMemoryStats {
            usage: Some(usage),
            limit: Some(limit),
            stats: Some(
                stats
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<HashMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn missing_cpu_stats_is_an_error() {
        let s = ContainerStatsResponse {
            cpu_stats: None,
            precpu_stats: Some(minimal_cpu_stats(0, 0)),
            memory_stats: Some(memory(1, 2, &[])),
            ..Default::default()
        };
        assert!(matches!(
            process_statistics(&s, "name"),
            Err(RuntimeError::MissingField("cpu_stats"))
        ));
    }

    #[test]
    fn missing_memory_stats_is_an_error() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 1000)),
            precpu_stats: Some(minimal_cpu_stats(50, 500)),
            ..Default::default()
        };
        assert!(matches!(
            process_statistics(&s, "name"),
            Err(RuntimeError::MissingField("memory_stats"))
        ));
    }

    #[test]
    fn computes_cpu_and_memory() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100_000_000, 1_000_000_000)),
            precpu_stats: Some(minimal_cpu_stats(50_000_000, 500_000_000)),
            memory_stats: Some(memory(
                256 * 1024 * 1024,
                512 * 1024 * 1024,
                &[("cache", 64 * 1024 * 1024)],
            )),
            ..Default::default()
        };
        let out = process_statistics(&s, "web").unwrap();
        assert_eq!(out.name, "web");
        assert!((out.cpu_percent - 20.0).abs() < 0.01);
        assert_eq!(out.memory_used, 192 * 1024 * 1024);
        assert_eq!(out.memory_limit, 512 * 1024 * 1024);
        assert!((out.memory_percent - 37.5).abs() < 1e-9);
    }

    #[test]
    fn cgroup_v2_subtracts_inactive_file() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 1000)),
            precpu_stats: Some(minimal_cpu_stats(50, 500)),
            memory_stats: Some(memory(1000, 4000, &[("inactive_file", 200)])),
            ..Default::default()
        };
        let out = process_statistics(&s, "n").unwrap();
        assert_eq!(out.memory_used, 800);
        assert!((out.memory_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_system_delta_returns_zero_cpu_percent() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 500)),
            precpu_stats: Some(minimal_cpu_stats(50, 500)),
            memory_stats: Some(memory(0, 0, &[])),
            ..Default::default()
        };
        let out = process_statistics(&s, "n").unwrap();
        assert_eq!(out.cpu_percent, 0.0);
        assert_eq!(out.memory_percent, 0.0);
    }

    #[test]
    fn cpu_percent_is_always_finite() {
        let cases = [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 4.0),
            (1.0, -5.0, 4.0),
            (f64::MAX, f64::MIN_POSITIVE, 64.0),
            (-10.0, 100.0, 2.0),
            (f64::NAN, 100.0, 2.0),
        ];
        for (cpu, sys, online) in cases {
            let pct = cpu_percent(cpu, sys, online);
            assert!(pct.is_finite(), "{cpu} / {sys} * {online} gave {pct}");
            assert!(pct >= 0.0);
        }
        assert_eq!(cpu_percent(5.0, 0.0, 8.0), 0.0);
    }
}
