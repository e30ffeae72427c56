// /persons handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use super::{AppState, ApiFailure, HandlerResult};
use crate::db::persons;
use crate::entities::{
    ContactInput, CreateByCnpj, DocumentInput, Page, PageQuery, Person, PersonContact,
    PersonDocument, PersonInput, TokenClaims,
};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> HandlerResult<Page<Person>> {
    let query = PageQuery::new(query.page, query.limit, query.search.as_deref());
    let conn = state.db()?;
    Ok(Json(persons::list_persons(&conn, &query)?))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
) -> HandlerResult<Person> {
    let conn = state.db()?;
    Ok(Json(persons::get_person(&conn, person_id)?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(input): Json<PersonInput>,
) -> Result<(StatusCode, Json<Person>), ApiFailure> {
    let conn = state.db()?;
    let person = persons::create_person(&conn, &input, &claims.username)?;
    Ok((StatusCode::CREATED, Json(person)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(person_id): Path<i64>,
    Json(input): Json<PersonInput>,
) -> HandlerResult<Person> {
    let conn = state.db()?;
    Ok(Json(persons::update_person(&conn, person_id, &input, &claims.username)?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(person_id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let conn = state.db()?;
    persons::delete_person(&conn, person_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /persons/create-by-cnpj
pub async fn create_by_cnpj(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(body): Json<CreateByCnpj>,
) -> Result<(StatusCode, Json<Person>), ApiFailure> {
    let conn = state.db()?;
    let person = persons::create_by_cnpj(&conn, &body.cnpj, &claims.username)?;
    Ok((StatusCode::CREATED, Json(person)))
}

pub async fn add_document(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(person_id): Path<i64>,
    Json(document): Json<DocumentInput>,
) -> Result<(StatusCode, Json<PersonDocument>), ApiFailure> {
    let conn = state.db()?;
    let document = persons::add_document(&conn, person_id, &document, &claims.username)?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn remove_document(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path((person_id, document_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiFailure> {
    let conn = state.db()?;
    persons::remove_document(&conn, person_id, document_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(person_id): Path<i64>,
    Json(contact): Json<ContactInput>,
) -> Result<(StatusCode, Json<PersonContact>), ApiFailure> {
    let conn = state.db()?;
    let contact = persons::add_contact(&conn, person_id, &contact, &claims.username)?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn remove_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path((person_id, contact_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiFailure> {
    let conn = state.db()?;
    persons::remove_contact(&conn, person_id, contact_id, &claims.username)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{admin_token, call, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_person_lifecycle() {
        let state = test_state();
        let token = admin_token(&state);

        let (status, created) = call(
            &state,
            "POST",
            "/persons",
            Some(&token),
            Some(json!({
                "full_name": "  Joana Prado ",
                "person_type": "PF",
                "contacts": [{ "contact_type": "EMAIL", "contact_value": "joana@example.com" }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["person_id"].as_i64().unwrap();

        let (status, page) = call(&state, "GET", "/persons?page=1&limit=10&search=joana", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["meta"]["total"], 1);
        assert_eq!(page["data"][0]["contacts"][0]["contact_value"], "joana@example.com");

        let (status, _) = call(&state, "DELETE", &format!("/persons/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&state, "GET", &format!("/persons/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_create_by_cnpj() {
        let state = test_state();
        let token = admin_token(&state);

        let (status, person) = call(
            &state,
            "POST",
            "/persons/create-by-cnpj",
            Some(&token),
            Some(json!({ "cnpj": "11.444.777/0001-61" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(person["person_type"], "PJ");

        let (status, _) = call(
            &state,
            "POST",
            "/persons/create-by-cnpj",
            Some(&token),
            Some(json!({ "cnpj": "11444777000161" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &state,
            "POST",
            "/persons/create-by-cnpj",
            Some(&token),
            Some(json!({ "cnpj": "11444777000162" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
