// 💸 Movement Service - /movements

use tracing::debug;

use super::fetch_page;
use crate::entities::{
    CancelMovement, Movement, MovementFilter, MovementInput, MovementMetrics, Page,
};
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;

const BASE: &str = "/movements";

#[derive(Clone)]
pub struct MovementService {
    client: ApiClient,
}

impl MovementService {
    pub fn new(client: ApiClient) -> Self {
        MovementService { client }
    }

    /// One page of movements matching `filter`
    ///
    /// Accepts both the {data, meta} envelope and the older
    /// {movements, pagination} shape.
    pub async fn list(&self, filter: &MovementFilter) -> ApiResult<Page<Movement>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(ApiError::InvalidInput(
                    "Start date must not be after end date.".to_string(),
                ));
            }
        }

        debug!(page = filter.page, limit = filter.limit, "listing movements");
        fetch_page(&self.client, BASE, filter.to_pairs(), filter.page, filter.limit).await
    }

    pub async fn get(&self, movement_id: i64) -> ApiResult<Movement> {
        self.client
            .get(&format!("{}/{}", BASE, movement_id), Vec::new())
            .await
    }

    pub async fn create(&self, input: &MovementInput) -> ApiResult<Movement> {
        check_amounts(input)?;
        self.client.post(BASE, input).await
    }

    pub async fn update(&self, movement_id: i64, input: &MovementInput) -> ApiResult<Movement> {
        check_amounts(input)?;
        self.client
            .put(&format!("{}/{}", BASE, movement_id), input)
            .await
    }

    pub async fn delete(&self, movement_id: i64) -> ApiResult<()> {
        self.client.delete(&format!("{}/{}", BASE, movement_id)).await
    }

    /// Move a movement to the final cancelled status
    pub async fn cancel(&self, movement_id: i64, reason: &str) -> ApiResult<Movement> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::InvalidInput(
                "A cancellation reason is required.".to_string(),
            ));
        }

        let body = CancelMovement {
            reason: reason.to_string(),
        };
        self.client
            .post(&format!("{}/{}/cancel", BASE, movement_id), &body)
            .await
    }

    /// Totals over the page selected by `filter`
    pub async fn metrics(&self, filter: &MovementFilter) -> ApiResult<MovementMetrics> {
        let page = self.list(filter).await?;
        Ok(MovementMetrics::from_movements(&page.data))
    }
}

fn check_amounts(input: &MovementInput) -> ApiResult<()> {
    let amounts = [input.total_amount, input.discount, input.addition, input.total_items];
    if amounts.iter().any(|amount| !amount.is_finite() || *amount < 0.0) {
        return Err(ApiError::InvalidInput(
            "Amounts must be non-negative numbers.".to_string(),
        ));
    }
    Ok(())
}
