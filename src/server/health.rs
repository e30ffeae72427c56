// /health handlers
//
// Host figures come from /proc where it exists; elsewhere they read
// "unknown" instead of failing the probe.

use axum::{extract::State, Json};
use chrono::Utc;
use std::fs;
use std::time::Instant;

use super::{AppState, HandlerResult};
use crate::db::sqlite_version;
use crate::entities::health::{
    format_bytes, format_uptime, AppMetrics, CpuMetrics, DatabaseHealth, DatabasesHealth,
    HealthStatus, MemoryMetrics, OsMetrics, ProcessMemory, ProcessMetrics, SystemHealth,
    SystemMetrics,
};

const UNKNOWN: &str = "unknown";

/// GET /health
pub async fn system_health(State(state): State<AppState>) -> HandlerResult<SystemHealth> {
    let databases = probe_databases(&state);
    let status = if databases.values().all(|db| db.success) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    Ok(Json(SystemHealth {
        status,
        timestamp: Utc::now().to_rfc3339(),
        version: crate::VERSION.to_string(),
        databases,
        system: collect_metrics(state.started_at),
    }))
}

/// GET /health/databases
pub async fn databases(State(state): State<AppState>) -> HandlerResult<DatabasesHealth> {
    Ok(Json(probe_databases(&state)))
}

/// GET /health/system
pub async fn system_metrics(State(state): State<AppState>) -> HandlerResult<SystemMetrics> {
    Ok(Json(collect_metrics(state.started_at)))
}

fn probe_databases(state: &AppState) -> DatabasesHealth {
    let started = Instant::now();
    let version = state
        .db()
        .map_err(|e| e.message)
        .and_then(|conn| sqlite_version(&conn).map_err(|e| e.to_string()));
    let elapsed = started.elapsed();

    let entry = match version {
        Ok(version) => DatabaseHealth {
            success: true,
            database: "SQLite".to_string(),
            response_time: format!("{}ms", elapsed.as_millis()),
            version,
            active_connections: "1".to_string(),
        },
        Err(e) => {
            tracing::error!(error = %e, "database probe failed");
            DatabaseHealth {
                success: false,
                database: "SQLite".to_string(),
                response_time: format!("{}ms", elapsed.as_millis()),
                version: UNKNOWN.to_string(),
                active_connections: "0".to_string(),
            }
        }
    };

    let mut databases = DatabasesHealth::new();
    databases.insert("Main DB".to_string(), entry);
    databases
}

// ============================================================================
// HOST METRICS
// ============================================================================

fn collect_metrics(started_at: Instant) -> SystemMetrics {
    let process_uptime = format_uptime(started_at.elapsed().as_secs());
    let (total, available) = memory_kb();

    let memory = match (total, available) {
        (Some(total), Some(available)) if total > 0 => {
            let used = total.saturating_sub(available);
            MemoryMetrics {
                total: format_bytes(total * 1024),
                free: format_bytes(available * 1024),
                used: format_bytes(used * 1024),
                usage_percentage: format!("{}", used * 100 / total),
            }
        }
        _ => MemoryMetrics {
            total: UNKNOWN.to_string(),
            free: UNKNOWN.to_string(),
            used: UNKNOWN.to_string(),
            usage_percentage: UNKNOWN.to_string(),
        },
    };

    SystemMetrics {
        cpu: CpuMetrics {
            count: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            model: proc_field("/proc/cpuinfo", "model name").unwrap_or_else(|| UNKNOWN.to_string()),
            speed: proc_field("/proc/cpuinfo", "cpu MHz")
                .map(|mhz| format!("{} MHz", mhz))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            usage: Vec::new(),
        },
        memory,
        os: OsMetrics {
            platform: std::env::consts::OS.to_string(),
            os_type: std::env::consts::FAMILY.to_string(),
            release: fs::read_to_string("/proc/sys/kernel/osrelease")
                .map(|release| release.trim().to_string())
                .unwrap_or_else(|_| UNKNOWN.to_string()),
            arch: std::env::consts::ARCH.to_string(),
            uptime: host_uptime_secs()
                .map(format_uptime)
                .unwrap_or_else(|| UNKNOWN.to_string()),
        },
        process: ProcessMetrics {
            uptime: process_uptime.clone(),
            memory_usage: ProcessMemory {
                rss: proc_kb("/proc/self/status", "VmRSS")
                    .map(|kb| format_bytes(kb * 1024))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                heap_total: UNKNOWN.to_string(),
                heap_used: UNKNOWN.to_string(),
                external: UNKNOWN.to_string(),
                array_buffers: UNKNOWN.to_string(),
            },
            version: crate::VERSION.to_string(),
            pid: std::process::id(),
        },
        app: AppMetrics {
            version: crate::VERSION.to_string(),
            uptime: process_uptime,
        },
    }
}

/// First "key: value" line of a /proc file
fn proc_field(path: &str, key: &str) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    content.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then(|| value.trim().to_string())
    })
}

/// A "Key:   1234 kB" figure from a /proc file
fn proc_kb(path: &str, key: &str) -> Option<u64> {
    proc_field(path, key)?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

fn memory_kb() -> (Option<u64>, Option<u64>) {
    (
        proc_kb("/proc/meminfo", "MemTotal"),
        proc_kb("/proc/meminfo", "MemAvailable"),
    )
}

fn host_uptime_secs() -> Option<u64> {
    let content = fs::read_to_string("/proc/uptime").ok()?;
    let seconds: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(seconds as u64)
}
