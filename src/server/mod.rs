// 🌐 REST API server (axum + rusqlite)
//
// One SQLite connection shared behind a mutex; handlers lock it for the
// duration of a single store call and never hold it across an await.
//
// Error bodies are always {"message": "..."} with the status code:
// - 401 missing/invalid bearer token or bad credentials
// - 404 unknown or soft-deleted resource
// - 422 rejected input
// - 409 conflicts (duplicate CNPJ, type still in use, ...)
// - 500 database failures

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::ServerConfig;
use crate::db::StoreError;

pub mod auth;
mod catalog;
mod health;
mod movements;
mod persons;
mod users;

pub use auth::{ensure_admin, hash_password, verify_password, TokenSigner};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub signer: Arc<TokenSigner>,
    pub refresh_token_ttl: chrono::Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(conn: Connection, config: &ServerConfig) -> anyhow::Result<Self> {
        let signer = match &config.jwt_secret {
            Some(secret) => TokenSigner::new(secret.as_bytes(), config.access_token_ttl),
            None => {
                warn!("FINANCE_JWT_SECRET not set, tokens will not survive a restart");
                TokenSigner::with_random_key(config.access_token_ttl)
            }
        }
        .map_err(|e| anyhow::anyhow!("invalid token signing key: {}", e))?;

        Ok(AppState {
            db: Arc::new(Mutex::new(conn)),
            signer: Arc::new(signer),
            refresh_token_ttl: chrono::Duration::seconds(config.refresh_token_ttl.as_secs() as i64),
            started_at: Instant::now(),
        })
    }

    /// Lock the connection; a poisoned lock is a 500, not a panic
    pub(crate) fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiFailure> {
        self.db.lock().map_err(|_| {
            error!("database mutex poisoned");
            ApiFailure::internal()
        })
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error response: a status plus {"message"}
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiFailure {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiFailure::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiFailure::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal() -> Self {
        ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<StoreError> for ApiFailure {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiFailure::new(StatusCode::NOT_FOUND, e.to_string()),
            StoreError::Invalid(message) => ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, message),
            StoreError::Conflict(message) => ApiFailure::new(StatusCode::CONFLICT, message),
            StoreError::Sqlite(_) | StoreError::Json(_) => {
                error!(error = %e, "store failure");
                ApiFailure::internal()
            }
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

pub type HandlerResult<T> = Result<Json<T>, ApiFailure>;

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/health", get(health::system_health))
        .route("/health/databases", get(health::databases))
        .route("/health/system", get(health::system_metrics));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/validate", get(auth::validate))
        // Persons
        .route("/persons", get(persons::list).post(persons::create))
        .route("/persons/create-by-cnpj", post(persons::create_by_cnpj))
        .route(
            "/persons/:id",
            get(persons::get_one).put(persons::update).delete(persons::remove),
        )
        .route("/persons/:id/documents", post(persons::add_document))
        .route("/persons/:id/documents/:document_id", delete(persons::remove_document))
        .route("/persons/:id/contacts", post(persons::add_contact))
        .route("/persons/:id/contacts/:contact_id", delete(persons::remove_contact))
        // Movements
        .route("/movements", get(movements::list).post(movements::create))
        .route(
            "/movements/:id",
            get(movements::get_one).put(movements::update).delete(movements::remove),
        )
        .route("/movements/:id/cancel", post(movements::cancel))
        // Catalog
        .route("/movement-status", get(catalog::list_statuses).post(catalog::create_status))
        .route(
            "/movement-status/:id",
            get(catalog::get_status)
                .put(catalog::update_status)
                .delete(catalog::delete_status),
        )
        .route("/movement-types", get(catalog::list_types).post(catalog::create_type))
        .route(
            "/movement-types/:id",
            get(catalog::get_type)
                .put(catalog::update_type)
                .delete(catalog::delete_type),
        )
        // Users
        .route("/users", get(users::list))
        .route("/users/:id", delete(users::remove))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process stops
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
