// 🔐 Auth Service - login, logout, refresh and the proactive refresh timer
//
// The session is the source of truth; this service only moves tokens
// between the server and the session.
//
// Refresh policy:
// - a token with less than the threshold left (5 min default), or already
//   expired, does not count as authenticated, and checking it kicks off a
//   background refresh
// - a failed refresh logs the user out
// - spawn_refresh_timer() keeps refreshing ahead of expiry until the
//   returned handle is dropped

use chrono::Utc;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entities::{LoginCredentials, LoginResponse, RefreshRequest, SessionUser};
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;
use crate::session::Session;

/// /auth/refresh answer; the user record is optional there
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    /// Set while a background refresh is in flight
    refreshing: Arc<AtomicBool>,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        AuthService {
            client,
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.client.session()
    }

    /// Exchange credentials for tokens and persist the session
    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<SessionUser> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(ApiError::InvalidInput(
                "Username and password are required.".to_string(),
            ));
        }

        let response: LoginResponse = self.client.post("/auth/login", credentials).await?;
        self.session()
            .store_login(&response)
            .map_err(ApiError::storage)?;

        info!(username = %response.user.username, "logged in");
        Ok(response.user)
    }

    /// Drop all three session values
    pub fn logout(&self) -> ApiResult<()> {
        self.session().clear().map_err(ApiError::storage)?;
        info!("logged out");
        Ok(())
    }

    /// Stored user record, falling back to /auth/me
    pub async fn current_user(&self) -> ApiResult<SessionUser> {
        if let Some(user) = self.session().user() {
            return Ok(user);
        }
        self.client.get("/auth/me", Vec::new()).await
    }

    /// True only for a token with more than the threshold left
    ///
    /// A token inside the threshold starts a background refresh (when a
    /// tokio runtime is available) and reports false for now.
    pub fn is_authenticated(&self) -> bool {
        let status = self.session().status();
        if status.needs_refresh() {
            self.spawn_refresh();
        }
        status.is_authenticated()
    }

    fn spawn_refresh(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime available, skipping background refresh");
            return;
        };
        if self.refreshing.swap(true, Ordering::SeqCst) {
            return;
        }

        let service = self.clone();
        runtime.spawn(async move {
            if let Err(e) = service.refresh().await {
                warn!(error = %e, "background token refresh failed");
            }
            service.refreshing.store(false, Ordering::SeqCst);
        });
    }

    /// Trade the refresh token for a new pair; any failure logs out
    pub async fn refresh(&self) -> ApiResult<()> {
        let Some(refresh_token) = self.session().refresh_token() else {
            warn!("no refresh token stored, logging out");
            self.logout()?;
            return Err(ApiError::Unauthorized);
        };

        let request = RefreshRequest { refresh_token };
        let response: ApiResult<RefreshResponse> = self.client.post("/auth/refresh", &request).await;

        match response {
            Ok(tokens) => {
                let stored = match tokens.user {
                    Some(user) => self.session().store_login(&LoginResponse {
                        access_token: tokens.access_token,
                        refresh_token: tokens.refresh_token,
                        user,
                    }),
                    None => self
                        .session()
                        .store_tokens(&tokens.access_token, &tokens.refresh_token),
                };
                stored.map_err(ApiError::storage)?;
                debug!("access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "token refresh rejected, logging out");
                self.logout()?;
                Err(e)
            }
        }
    }

    /// Refresh now when the stored token is inside the threshold or expired
    ///
    /// Meant to run before an authenticated call, so a stale access token
    /// is traded in instead of being sent and answered with a 401.
    pub async fn ensure_fresh(&self) -> ApiResult<()> {
        if self.session().status().needs_refresh() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Probe /auth/validate; an unauthorized answer is a plain `false`
    pub async fn validate_token(&self) -> ApiResult<bool> {
        let probe: ApiResult<serde_json::Value> = self.client.get("/auth/validate", Vec::new()).await;
        match probe {
            Ok(_) => Ok(true),
            Err(ApiError::Unauthorized) | Err(ApiError::Forbidden) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Keep the access token fresh in the background
    ///
    /// The task sleeps until the token enters the threshold, refreshes,
    /// and repeats. It stops on its own when there is no token left to
    /// refresh or a refresh fails, and is aborted when the handle drops.
    pub fn spawn_refresh_timer(&self) -> RefreshTimer {
        let service = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                let Some(delay) = service.session().refresh_due_in(Utc::now()) else {
                    debug!("no valid token, refresh timer stopping");
                    break;
                };

                debug!(delay_secs = delay.as_secs(), "next token refresh scheduled");
                tokio::time::sleep(delay).await;

                if let Err(e) = service.refresh().await {
                    warn!(error = %e, "scheduled token refresh failed, timer stopping");
                    break;
                }

                // A fresh token that is already inside the threshold would spin
                if service.session().status().needs_refresh() {
                    warn!("refreshed token expires within the threshold, timer stopping");
                    break;
                }
            }
        });

        RefreshTimer { handle }
    }
}

/// Handle of the background refresh task; dropping it stops the task
#[derive(Debug)]
pub struct RefreshTimer {
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        // Drop does the work
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{scripted_client, ScriptedTransport};
    use crate::session::{token_expiring_in, TokenStatus};
    use serde_json::json;

    fn login_body(access_token: &str) -> serde_json::Value {
        json!({
            "accessToken": access_token,
            "refreshToken": "refresh-2",
            "user": { "user_id": 1, "username": "admin", "profile_id": 1 }
        })
    }

    async fn wait_for_calls(transport: &ScriptedTransport, expected: usize) {
        for _ in 0..100 {
            if transport.call_count() >= expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let (client, transport, session) = scripted_client();
        let token = token_expiring_in(3600);
        transport.respond(200, login_body(&token));
        let auth = AuthService::new(client);

        let user = auth.login(&LoginCredentials::new("admin", "admin")).await.unwrap();

        assert_eq!(user.username, "admin");
        assert_eq!(session.token(), Some(token));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
        assert_eq!(transport.last_request().path, "/auth/login");
        assert!(auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let (client, transport, _session) = scripted_client();
        let auth = AuthService::new(client);

        let result = auth.login(&LoginCredentials::new(" ", "x")).await;

        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let (client, transport, session) = scripted_client();
        transport.respond(200, login_body(&token_expiring_in(3600)));
        let auth = AuthService::new(client);
        auth.login(&LoginCredentials::new("admin", "admin")).await.unwrap();

        auth.logout().unwrap();

        assert_eq!(session.status(), TokenStatus::Missing);
        assert_eq!(session.user(), None);
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_expiring_token_is_not_authenticated_and_refreshes() {
        let (client, transport, session) = scripted_client();
        session.store_tokens(&token_expiring_in(120), "refresh-1").unwrap();
        let fresh = token_expiring_in(3600);
        transport.respond(200, login_body(&fresh));
        let auth = AuthService::new(client);

        assert!(!auth.is_authenticated());

        wait_for_calls(&transport, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let request = transport.last_request();
        assert_eq!(request.path, "/auth/refresh");
        assert_eq!(request.body, Some(json!({ "refresh_token": "refresh-1" })));
        assert_eq!(session.token(), Some(fresh));
    }

    #[tokio::test]
    async fn test_expired_token_triggers_background_refresh() {
        let (client, transport, session) = scripted_client();
        session.store_tokens(&token_expiring_in(-60), "refresh-1").unwrap();
        let fresh = token_expiring_in(3600);
        transport.respond(200, login_body(&fresh));
        let auth = AuthService::new(client);

        assert!(!auth.is_authenticated());

        wait_for_calls(&transport, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.last_request().path, "/auth/refresh");
        assert_eq!(session.token(), Some(fresh));
        assert!(auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_ensure_fresh() {
        let (client, transport, session) = scripted_client();
        let auth = AuthService::new(client);

        // Nothing stored: nothing to do
        auth.ensure_fresh().await.unwrap();
        assert_eq!(transport.call_count(), 0);

        session.store_tokens(&token_expiring_in(3600), "refresh-1").unwrap();
        auth.ensure_fresh().await.unwrap();
        assert_eq!(transport.call_count(), 0);

        // Expired access token, refresh token still accepted
        session.store_tokens(&token_expiring_in(-3600), "refresh-1").unwrap();
        let fresh = token_expiring_in(3600);
        transport.respond(200, login_body(&fresh));
        auth.ensure_fresh().await.unwrap();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(session.token(), Some(fresh));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_failed_refresh_logs_out() {
        let (client, transport, session) = scripted_client();
        session.store_tokens(&token_expiring_in(120), "stale").unwrap();
        transport.respond(500, json!({ "message": "boom" }));
        let auth = AuthService::new(client);

        let result = auth.refresh().await;

        assert_eq!(result, Err(ApiError::Server { status: 500 }));
        assert_eq!(session.token(), None);
        assert_eq!(session.refresh_token(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let (client, transport, _session) = scripted_client();
        let auth = AuthService::new(client);

        assert_eq!(auth.refresh().await, Err(ApiError::Unauthorized));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_current_user_prefers_session() {
        let (client, transport, _session) = scripted_client();
        transport.respond(200, json!({ "user_id": 4, "username": "maria" }));
        let auth = AuthService::new(client);

        // Nothing stored: asks the server
        let user = auth.current_user().await.unwrap();
        assert_eq!(user.username, "maria");
        assert_eq!(transport.last_request().path, "/auth/me");

        transport.respond(200, login_body(&token_expiring_in(3600)));
        auth.login(&LoginCredentials::new("admin", "admin")).await.unwrap();
        let calls = transport.call_count();

        assert_eq!(auth.current_user().await.unwrap().username, "admin");
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn test_validate_token() {
        let (client, transport, _session) = scripted_client();
        transport.respond(200, json!({ "valid": true }));
        transport.respond(401, json!({}));
        transport.respond(503, json!({}));
        let auth = AuthService::new(client);

        assert_eq!(auth.validate_token().await, Ok(true));
        assert_eq!(auth.validate_token().await, Ok(false));
        assert_eq!(auth.validate_token().await, Err(ApiError::Server { status: 503 }));
    }

    #[tokio::test]
    async fn test_refresh_timer_refreshes_and_stops_on_drop() {
        let (client, transport, session) = scripted_client();
        session.store_tokens(&token_expiring_in(60), "refresh-1").unwrap();
        let fresh = token_expiring_in(3600);
        transport.respond(200, login_body(&fresh));
        let auth = AuthService::new(client);

        let timer = auth.spawn_refresh_timer();
        wait_for_calls(&transport, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(session.token(), Some(fresh));
        assert!(!timer.is_finished());

        timer.stop();
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_timer_refreshes_expired_token_at_once() {
        let (client, transport, session) = scripted_client();
        session.store_tokens(&token_expiring_in(-60), "refresh-1").unwrap();
        let fresh = token_expiring_in(3600);
        transport.respond(200, login_body(&fresh));
        let auth = AuthService::new(client);

        let timer = auth.spawn_refresh_timer();
        wait_for_calls(&transport, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(transport.call_count(), 1);
        assert_eq!(session.token(), Some(fresh));
        assert!(!timer.is_finished());
    }

    #[tokio::test]
    async fn test_refresh_timer_without_token_finishes() {
        let (client, _transport, _session) = scripted_client();
        let auth = AuthService::new(client);

        let timer = auth.spawn_refresh_timer();
        for _ in 0..100 {
            if timer.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(timer.is_finished());
    }
}
