// 🔑 User Entity + authentication payloads
//
// A user is a login bound to a Person. Tokens carry the user id,
// username and profile so the client can show who is logged in
// without an extra round trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// USER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub person_id: i64,
    #[serde(default)]
    pub profile_id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Joined from the person record
    #[serde(default)]
    pub person_name: String,
}

// ============================================================================
// AUTH PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        LoginCredentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// The user record kept in the session next to the tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub profile_id: Option<i64>,
}

/// Answer of /auth/login and /auth/refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: SessionUser,
}

/// Body of /auth/refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Access token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub profile_id: Option<i64>,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

impl TokenClaims {
    pub fn user(&self) -> SessionUser {
        SessionUser {
            user_id: self.id,
            username: self.username.clone(),
            profile_id: self.profile_id,
        }
    }

    /// Seconds left before expiry at `now` (negative once expired)
    pub fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        self.exp - now.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_response_wire_names() {
        let response: LoginResponse = serde_json::from_value(json!({
            "accessToken": "a",
            "refreshToken": "r",
            "user": { "user_id": 1, "username": "admin", "profile_id": null }
        }))
        .unwrap();

        assert_eq!(response.access_token, "a");
        assert_eq!(response.refresh_token, "r");
        assert_eq!(response.user.profile_id, None);
    }

    #[test]
    fn test_claims_remaining() {
        let now = Utc::now();
        let claims = TokenClaims {
            id: 1,
            username: "admin".to_string(),
            profile_id: Some(1),
            iat: now.timestamp(),
            exp: now.timestamp() + 120,
        };

        assert_eq!(claims.remaining_at(now), 120);
        assert_eq!(claims.user().username, "admin");
    }
}
