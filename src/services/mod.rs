// Domain Services
//
// One service per resource. Each maps its operations onto REST calls
// through the shared ApiClient and reshapes server payloads into the
// typed records in `entities`. Services return ApiResult and never
// notify the user themselves.

pub mod auth;
pub mod health;
pub mod movement_statuses;
pub mod movement_types;
pub mod movements;
pub mod persons;
pub mod users;

pub use auth::{AuthService, RefreshTimer};
pub use health::HealthService;
pub use movement_statuses::MovementStatusService;
pub use movement_types::MovementTypeService;
pub use movements::MovementService;
pub use persons::PersonService;
pub use users::UserService;

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::entities::Page;
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;
use crate::session::Session;

/// Every service wired to one client and one session
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub persons: PersonService,
    pub movements: MovementService,
    pub movement_statuses: MovementStatusService,
    pub movement_types: MovementTypeService,
    pub users: UserService,
    pub health: HealthService,
}

impl Services {
    pub fn new(client: ApiClient, config: &AppConfig) -> Self {
        Services {
            auth: AuthService::new(client.clone()),
            persons: PersonService::new(client.clone()),
            movements: MovementService::new(client.clone()),
            movement_statuses: MovementStatusService::new(client.clone()),
            movement_types: MovementTypeService::new(client.clone()),
            users: UserService::new(client.clone()),
            health: HealthService::new(client, config.api.use_mock),
        }
    }

    /// Reqwest client against `config.api.base_url`
    pub fn from_config(config: &AppConfig, session: Arc<Session>) -> ApiResult<Self> {
        let client = ApiClient::from_config(&config.api, session)?;
        Ok(Services::new(client, config))
    }
}

/// GET a list endpoint and reshape whatever comes back into a Page
pub(crate) async fn fetch_page<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
    query: Vec<(String, String)>,
    page: u32,
    per_page: u32,
) -> ApiResult<Page<T>> {
    let body: serde_json::Value = client.get(path, query).await?;
    Page::from_value(body, page, per_page).map_err(|e| ApiError::Decode(e.to_string()))
}

/// GET a catalog endpoint that may answer with a bare array or an envelope
pub(crate) async fn fetch_all<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
) -> ApiResult<Vec<T>> {
    let page = fetch_page(client, path, Vec::new(), 1, u32::MAX).await?;
    Ok(page.data)
}
