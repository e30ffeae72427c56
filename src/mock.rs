// Canned health snapshot, served instead of the network when
// FINANCE_USE_MOCK is on (demo mode, offline screens).

use chrono::Utc;

use crate::entities::health::{
    AppMetrics, CpuMetrics, CpuTimes, CpuUsage, DatabaseHealth, DatabasesHealth, HealthStatus,
    MemoryMetrics, OsMetrics, ProcessMemory, ProcessMetrics, SystemHealth, SystemMetrics,
};

pub fn databases() -> DatabasesHealth {
    let mut databases = DatabasesHealth::new();
    databases.insert(
        "Main DB".to_string(),
        DatabaseHealth {
            success: true,
            database: "SQLite".to_string(),
            response_time: "3ms".to_string(),
            version: "3.45.0".to_string(),
            active_connections: "1".to_string(),
        },
    );
    databases
}

pub fn system_metrics() -> SystemMetrics {
    SystemMetrics {
        cpu: CpuMetrics {
            count: 8,
            model: "Mock CPU".to_string(),
            speed: "3.2 GHz".to_string(),
            usage: vec![CpuUsage {
                usage: "45%".to_string(),
                times: CpuTimes {
                    user: 123_456,
                    nice: 0,
                    sys: 78_901,
                    idle: 234_567,
                    irq: 0,
                },
            }],
        },
        memory: MemoryMetrics {
            total: "16 GB".to_string(),
            free: "8.5 GB".to_string(),
            used: "7.5 GB".to_string(),
            usage_percentage: "47".to_string(),
        },
        os: OsMetrics {
            platform: "linux".to_string(),
            os_type: "Linux".to_string(),
            release: "6.1.0".to_string(),
            arch: "x86_64".to_string(),
            uptime: "5 days".to_string(),
        },
        process: ProcessMetrics {
            uptime: "2 hours".to_string(),
            memory_usage: ProcessMemory {
                rss: "156 MB".to_string(),
                heap_total: "64 MB".to_string(),
                heap_used: "32 MB".to_string(),
                external: "12 MB".to_string(),
                array_buffers: "2 MB".to_string(),
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            pid: 12_345,
        },
        app: AppMetrics {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime: "2 hours".to_string(),
        },
    }
}

/// Healthy snapshot stamped with the current time
pub fn system_health() -> SystemHealth {
    SystemHealth {
        status: HealthStatus::Healthy,
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        databases: databases(),
        system: system_metrics(),
    }
}
