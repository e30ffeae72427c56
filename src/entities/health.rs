// 🩺 System Health snapshot
//
// Wire names follow the health endpoint (camelCase inside the system block).
// Sizes and durations arrive pre-formatted for display ("16 GB", "2 hours").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub success: bool,
    pub database: String,
    pub response_time: String,
    pub version: String,
    pub active_connections: String,
}

pub type DatabasesHealth = BTreeMap<String, DatabaseHealth>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub sys: u64,
    pub idle: u64,
    pub irq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub usage: String,
    pub times: CpuTimes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub count: u32,
    pub model: String,
    pub speed: String,
    #[serde(default)]
    pub usage: Vec<CpuUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub total: String,
    pub free: String,
    pub used: String,
    pub usage_percentage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsMetrics {
    pub platform: String,
    #[serde(rename = "type")]
    pub os_type: String,
    pub release: String,
    pub arch: String,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMemory {
    pub rss: String,
    pub heap_total: String,
    pub heap_used: String,
    pub external: String,
    pub array_buffers: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub uptime: String,
    pub memory_usage: ProcessMemory,
    pub version: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMetrics {
    pub version: String,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub os: OsMetrics,
    pub process: ProcessMetrics,
    pub app: AppMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    /// RFC 3339
    pub timestamp: String,
    pub version: String,
    pub databases: DatabasesHealth,
    pub system: SystemMetrics,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy && self.databases.values().all(|db| db.success)
    }

    /// Names of databases that failed their probe
    pub fn failing_databases(&self) -> Vec<&str> {
        self.databases
            .iter()
            .filter(|(_, db)| !db.success)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Human-readable uptime: "3 days", "2 hours", "5 minutes", "12 seconds"
pub fn format_uptime(seconds: u64) -> String {
    let (value, unit) = if seconds >= 86_400 {
        (seconds / 86_400, "day")
    } else if seconds >= 3_600 {
        (seconds / 3_600, "hour")
    } else if seconds >= 60 {
        (seconds / 60, "minute")
    } else {
        (seconds, "second")
    };

    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

/// Human-readable byte size: "512 B", "64 MB", "16.0 GB"
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}
