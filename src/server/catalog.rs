// /movement-status and /movement-types handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use super::{AppState, ApiFailure, HandlerResult};
use crate::db::catalog;
use crate::entities::{
    MovementStatus, MovementStatusInput, MovementType, MovementTypeInput, TokenClaims,
};

// ============================================================================
// STATUSES
// ============================================================================

pub async fn list_statuses(State(state): State<AppState>) -> HandlerResult<Vec<MovementStatus>> {
    let conn = state.db()?;
    Ok(Json(catalog::list_statuses(&conn)?))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(status_id): Path<i64>,
) -> HandlerResult<MovementStatus> {
    let conn = state.db()?;
    Ok(Json(catalog::get_status(&conn, status_id)?))
}

pub async fn create_status(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(input): Json<MovementStatusInput>,
) -> Result<(StatusCode, Json<MovementStatus>), ApiFailure> {
    let conn = state.db()?;
    let status = catalog::create_status(&conn, &input, &claims.username)?;
    Ok((StatusCode::CREATED, Json(status)))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(status_id): Path<i64>,
    Json(input): Json<MovementStatusInput>,
) -> HandlerResult<MovementStatus> {
    let conn = state.db()?;
    Ok(Json(catalog::update_status(&conn, status_id, &input, &claims.username)?))
}

pub async fn delete_status(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(status_id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let conn = state.db()?;
    catalog::delete_status(&conn, status_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// TYPES
// ============================================================================

pub async fn list_types(State(state): State<AppState>) -> HandlerResult<Vec<MovementType>> {
    let conn = state.db()?;
    Ok(Json(catalog::list_types(&conn)?))
}

pub async fn get_type(
    State(state): State<AppState>,
    Path(type_id): Path<i64>,
) -> HandlerResult<MovementType> {
    let conn = state.db()?;
    Ok(Json(catalog::get_type(&conn, type_id)?))
}

pub async fn create_type(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(input): Json<MovementTypeInput>,
) -> Result<(StatusCode, Json<MovementType>), ApiFailure> {
    let conn = state.db()?;
    let kind = catalog::create_type(&conn, &input, &claims.username)?;
    Ok((StatusCode::CREATED, Json(kind)))
}

pub async fn update_type(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(type_id): Path<i64>,
    Json(input): Json<MovementTypeInput>,
) -> HandlerResult<MovementType> {
    let conn = state.db()?;
    Ok(Json(catalog::update_type(&conn, type_id, &input, &claims.username)?))
}

pub async fn delete_type(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(type_id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let conn = state.db()?;
    catalog::delete_type(&conn, type_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{admin_token, call, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_statuses_come_ordered() {
        let state = test_state();
        let token = admin_token(&state);

        let (status, statuses) = call(&state, "GET", "/movement-status", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<&str> = statuses
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["status_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Pending", "Confirmed", "Cancelled"]);

        let (status, _) = call(&state, "POST", "/movement-status", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_type_in_use_cannot_be_deleted() {
        let state = test_state();
        let token = admin_token(&state);

        let movement = json!({
            "movement_date": "2024-06-01",
            "person_id": 1,
            "total_amount": 5.0,
            "movement_type_id": 1,
            "movement_status_id": 1
        });
        let (status, _) = call(&state, "POST", "/movements", Some(&token), Some(movement)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, kind) = call(&state, "GET", "/movement-types/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(kind["_count"]["movements"], 1);

        let (status, _) = call(&state, "DELETE", "/movement-types/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&state, "DELETE", "/movement-types/2", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
