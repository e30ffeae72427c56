// 🚦 Movement Status Service - /movement-status

use super::fetch_all;
use crate::entities::{MovementStatus, MovementStatusInput};
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;

const BASE: &str = "/movement-status";

#[derive(Clone)]
pub struct MovementStatusService {
    client: ApiClient,
}

impl MovementStatusService {
    pub fn new(client: ApiClient) -> Self {
        MovementStatusService { client }
    }

    /// All active statuses, by display order
    pub async fn list(&self) -> ApiResult<Vec<MovementStatus>> {
        let mut statuses: Vec<MovementStatus> = fetch_all(&self.client, BASE).await?;
        statuses.sort_by_key(|status| (status.display_order, status.movement_status_id));
        Ok(statuses)
    }

    /// Statuses usable with one movement type (plus the unrestricted ones)
    pub async fn list_for_type(&self, movement_type_id: i64) -> ApiResult<Vec<MovementStatus>> {
        let statuses = self.list().await?;
        Ok(statuses
            .into_iter()
            .filter(|status| {
                status
                    .movement_type_id
                    .map_or(true, |type_id| type_id == movement_type_id)
            })
            .collect())
    }

    pub async fn get(&self, status_id: i64) -> ApiResult<MovementStatus> {
        self.client
            .get(&format!("{}/{}", BASE, status_id), Vec::new())
            .await
    }

    pub async fn create(&self, input: &MovementStatusInput) -> ApiResult<MovementStatus> {
        let named = input
            .status_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !named {
            return Err(ApiError::InvalidInput("Status name is required.".to_string()));
        }
        self.client.post(BASE, input).await
    }

    pub async fn update(
        &self,
        status_id: i64,
        input: &MovementStatusInput,
    ) -> ApiResult<MovementStatus> {
        if input.status_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ApiError::InvalidInput("Status name cannot be blank.".to_string()));
        }
        self.client
            .put(&format!("{}/{}", BASE, status_id), input)
            .await
    }

    pub async fn delete(&self, status_id: i64) -> ApiResult<()> {
        self.client.delete(&format!("{}/{}", BASE, status_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::scripted_client;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_sorted_and_filtered_by_type() {
        let (client, transport, _session) = scripted_client();
        let body = json!([
            { "movement_status_id": 3, "status_name": "Cancelled", "display_order": 3, "is_final": true },
            { "movement_status_id": 1, "status_name": "Pending", "display_order": 1 },
            { "movement_status_id": 4, "status_name": "Shipped", "display_order": 2, "movement_type_id": 2 }
        ]);
        transport.respond(200, body.clone());
        transport.respond(200, body);
        let statuses = MovementStatusService::new(client);

        let all = statuses.list().await.unwrap();
        let names: Vec<&str> = all.iter().map(|s| s.status_name.as_str()).collect();
        assert_eq!(names, vec!["Pending", "Shipped", "Cancelled"]);

        let for_sales = statuses.list_for_type(1).await.unwrap();
        assert_eq!(for_sales.len(), 2);
        assert!(for_sales.iter().all(|s| s.status_name != "Shipped"));
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let (client, transport, _session) = scripted_client();
        transport.respond(
            201,
            json!({ "movement_status_id": 9, "status_name": "Paid", "display_order": 4 }),
        );
        let statuses = MovementStatusService::new(client);

        let missing = statuses.create(&MovementStatusInput::default()).await;
        assert!(matches!(missing, Err(ApiError::InvalidInput(_))));
        assert_eq!(transport.call_count(), 0);

        let created = statuses.create(&MovementStatusInput::named("Paid")).await.unwrap();
        assert_eq!(created.movement_status_id, 9);
        assert!(created.active);
        assert_eq!(transport.last_request().body, Some(json!({ "status_name": "Paid" })));
    }
}
