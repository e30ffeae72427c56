// /movements handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use super::{AppState, ApiFailure, HandlerResult};
use crate::db::movements;
use crate::entities::{
    normalize_search, CancelMovement, Movement, MovementFilter, MovementInput, Page, TokenClaims,
};

/// GET /movements?page&limit&search&startDate&endDate&status&movementTypeId
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> HandlerResult<Page<Movement>> {
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(ApiFailure::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "startDate must not be after endDate",
            ));
        }
    }

    let (page, limit) = (filter.page, filter.limit);
    let filter = MovementFilter {
        search: normalize_search(filter.search.as_deref()),
        status: normalize_search(filter.status.as_deref()),
        ..filter
    }
    .page(page, limit);

    let conn = state.db()?;
    Ok(Json(movements::list_movements(&conn, &filter)?))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(movement_id): Path<i64>,
) -> HandlerResult<Movement> {
    let conn = state.db()?;
    Ok(Json(movements::get_movement(&conn, movement_id)?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(input): Json<MovementInput>,
) -> Result<(StatusCode, Json<Movement>), ApiFailure> {
    let conn = state.db()?;
    let movement = movements::create_movement(&conn, &input, &claims.username)?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(movement_id): Path<i64>,
    Json(input): Json<MovementInput>,
) -> HandlerResult<Movement> {
    let conn = state.db()?;
    Ok(Json(movements::update_movement(&conn, movement_id, &input, &claims.username)?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(movement_id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let conn = state.db()?;
    movements::delete_movement(&conn, movement_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /movements/{id}/cancel {"reason"}
pub async fn cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(movement_id): Path<i64>,
    Json(body): Json<CancelMovement>,
) -> HandlerResult<Movement> {
    let conn = state.db()?;
    Ok(Json(movements::cancel_movement(
        &conn,
        movement_id,
        &body.reason,
        &claims.username,
    )?))
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{admin_token, call, test_state};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    /// Person 1 is the seeded administrator; type 1 / status 1 are seeds
    fn sale(date: &str, amount: f64) -> Value {
        json!({
            "movement_date": date,
            "person_id": 1,
            "total_amount": amount,
            "total_items": amount,
            "movement_type_id": 1,
            "movement_status_id": 1
        })
    }

    #[tokio::test]
    async fn test_filters_and_cancel() {
        let state = test_state();
        let token = admin_token(&state);

        for (date, amount) in [("2024-06-01", 10.0), ("2024-06-15", 20.0), ("2024-07-01", 30.0)] {
            let (status, _) = call(&state, "POST", "/movements", Some(&token), Some(sale(date, amount))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, june) = call(
            &state,
            "GET",
            "/movements?startDate=2024-06-01&endDate=2024-06-30",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(june["meta"]["total"], 2);
        // Newest first
        assert_eq!(june["data"][0]["movement_date"], "2024-06-15");

        let id = june["data"][0]["movement_id"].as_i64().unwrap();
        let (status, _) = call(
            &state,
            "POST",
            &format!("/movements/{}/cancel", id),
            Some(&token),
            Some(json!({ "reason": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, cancelled) = call(
            &state,
            "POST",
            &format!("/movements/{}/cancel", id),
            Some(&token),
            Some(json!({ "reason": "duplicated entry" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["movement_status_name"], "Cancelled");
        assert_eq!(cancelled["cancel_reason"], "duplicated entry");

        let (_, by_status) = call(&state, "GET", "/movements?status=cancelled", Some(&token), None).await;
        assert_eq!(by_status["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let state = test_state();
        let token = admin_token(&state);

        let (status, _) = call(
            &state,
            "GET",
            "/movements?startDate=2024-07-01&endDate=2024-06-01",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
