// 🔑 User Service - /users

use super::fetch_page;
use crate::entities::{Page, PageQuery, User};
use crate::error::ApiResult;
use crate::http::ApiClient;

#[derive(Clone)]
pub struct UserService {
    client: ApiClient,
}

impl UserService {
    pub fn new(client: ApiClient) -> Self {
        UserService { client }
    }

    pub async fn list(&self, query: &PageQuery) -> ApiResult<Page<User>> {
        fetch_page(&self.client, "/users", query.to_pairs(), query.page, query.limit).await
    }

    pub async fn delete(&self, user_id: i64) -> ApiResult<()> {
        self.client.delete(&format!("/users/{}", user_id)).await
    }
}
