// /users handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use super::{AppState, ApiFailure, HandlerResult};
use crate::db::users;
use crate::entities::{Page, PageQuery, TokenClaims, User};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> HandlerResult<Page<User>> {
    let query = PageQuery::new(query.page, query.limit, query.search.as_deref());
    let conn = state.db()?;
    Ok(Json(users::list_users(&conn, &query)?))
}

/// DELETE /users/{id}; nobody can delete their own account
pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    if user_id == claims.id {
        return Err(ApiFailure::forbidden("You cannot delete your own account"));
    }

    let conn = state.db()?;
    users::delete_user(&conn, user_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{admin_token, call, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_list_and_self_delete() {
        let state = test_state();
        let token = admin_token(&state);

        let (status, page) = call(&state, "GET", "/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["meta"]["total"], 1);
        assert_eq!(page["data"][0]["person_name"], "Administrator");

        let admin_id = page["data"][0]["user_id"].as_i64().unwrap();
        let (status, _) = call(&state, "DELETE", &format!("/users/{}", admin_id), Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&state, "DELETE", "/users/999", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
