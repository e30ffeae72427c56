// 🏷️ Movement Type Service - /movement-types

use super::fetch_all;
use crate::entities::{MovementType, MovementTypeInput};
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;

const BASE: &str = "/movement-types";

#[derive(Clone)]
pub struct MovementTypeService {
    client: ApiClient,
}

impl MovementTypeService {
    pub fn new(client: ApiClient) -> Self {
        MovementTypeService { client }
    }

    /// All active types; `_count` defaults to zeros when the server omits it
    pub async fn list(&self) -> ApiResult<Vec<MovementType>> {
        fetch_all(&self.client, BASE).await
    }

    pub async fn get(&self, type_id: i64) -> ApiResult<MovementType> {
        self.client
            .get(&format!("{}/{}", BASE, type_id), Vec::new())
            .await
    }

    pub async fn create(&self, input: &MovementTypeInput) -> ApiResult<MovementType> {
        let input = checked(input)?;
        self.client.post(BASE, &input).await
    }

    pub async fn update(&self, type_id: i64, input: &MovementTypeInput) -> ApiResult<MovementType> {
        let input = checked(input)?;
        self.client
            .put(&format!("{}/{}", BASE, type_id), &input)
            .await
    }

    /// The server refuses (409) while movements still use the type
    pub async fn delete(&self, type_id: i64) -> ApiResult<()> {
        self.client.delete(&format!("{}/{}", BASE, type_id)).await
    }
}

fn checked(input: &MovementTypeInput) -> ApiResult<MovementTypeInput> {
    let type_name = input.type_name.trim();
    if type_name.is_empty() {
        return Err(ApiError::InvalidInput("Type name is required.".to_string()));
    }
    Ok(MovementTypeInput {
        type_name: type_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::scripted_client;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_fills_counts() {
        let (client, transport, _session) = scripted_client();
        transport.respond(
            200,
            json!({
                "data": [
                    { "movement_type_id": 1, "type_name": "Sale", "_count": { "movements": 3, "movement_statuses": 1 } },
                    { "movement_type_id": 2, "type_name": "Purchase" }
                ],
                "meta": { "total": 2, "per_page": 10, "current_page": 1, "last_page": 1 }
            }),
        );
        let types = MovementTypeService::new(client);

        let list = types.list().await.unwrap();

        assert!(list[0].is_in_use());
        assert_eq!(list[1].count.movements, 0);
        assert!(list[1].active);
    }

    #[tokio::test]
    async fn test_delete_in_use_conflict() {
        let (client, transport, _session) = scripted_client();
        transport.respond(409, json!({ "message": "type in use" }));
        let types = MovementTypeService::new(client);

        assert_eq!(types.delete(1).await, Err(ApiError::Status { status: 409 }));
        assert_eq!(transport.last_request().path, "/movement-types/1");
    }

    #[tokio::test]
    async fn test_create_trims_name() {
        let (client, transport, _session) = scripted_client();
        transport.respond(201, json!({ "movement_type_id": 3, "type_name": "Return" }));
        let types = MovementTypeService::new(client);

        let blank = MovementTypeInput { type_name: "  ".to_string() };
        assert!(matches!(types.create(&blank).await, Err(ApiError::InvalidInput(_))));

        let input = MovementTypeInput { type_name: " Return ".to_string() };
        types.create(&input).await.unwrap();
        assert_eq!(transport.last_request().body, Some(json!({ "type_name": "Return" })));
    }
}
