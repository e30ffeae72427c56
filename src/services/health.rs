// 🩺 Health Service - /health, /health/databases, /health/system
//
// With use_mock on, every call answers from the canned snapshot and the
// network is never touched.

use crate::entities::{DatabasesHealth, SystemHealth, SystemMetrics};
use crate::error::ApiResult;
use crate::http::ApiClient;
use crate::mock;

#[derive(Clone)]
pub struct HealthService {
    client: ApiClient,
    use_mock: bool,
}

impl HealthService {
    pub fn new(client: ApiClient, use_mock: bool) -> Self {
        HealthService { client, use_mock }
    }

    pub async fn system(&self) -> ApiResult<SystemHealth> {
        if self.use_mock {
            return Ok(mock::system_health());
        }
        self.client.get("/health", Vec::new()).await
    }

    pub async fn databases(&self) -> ApiResult<DatabasesHealth> {
        if self.use_mock {
            return Ok(mock::databases());
        }
        self.client.get("/health/databases", Vec::new()).await
    }

    pub async fn metrics(&self) -> ApiResult<SystemMetrics> {
        if self.use_mock {
            return Ok(mock::system_metrics());
        }
        self.client.get("/health/system", Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::scripted_client;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_never_calls_network() {
        let (client, transport, _session) = scripted_client();
        let health = HealthService::new(client, true);

        let snapshot = health.system().await.unwrap();
        assert!(snapshot.is_healthy());
        assert!(!health.databases().await.unwrap().is_empty());
        assert_eq!(health.metrics().await.unwrap().cpu.count, 8);

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_databases_from_server() {
        let (client, transport, _session) = scripted_client();
        transport.respond(
            200,
            json!({
                "main": {
                    "success": false,
                    "database": "SQLite",
                    "responseTime": "0ms",
                    "version": "unknown",
                    "activeConnections": "0"
                }
            }),
        );
        let health = HealthService::new(client, false);

        let databases = health.databases().await.unwrap();

        assert!(!databases["main"].success);
        assert_eq!(transport.last_request().path, "/health/databases");
    }
}
