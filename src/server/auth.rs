// 🔐 Server-side authentication
//
// Access tokens are HS256 JWTs whose payload is TokenClaims, so the client
// can read `exp` without the key. Refresh tokens are opaque uuids stored in
// SQLite and consumed on use: every refresh hands out a new pair.
//
// Passwords are stored as "salt$digest" (base64, SHA-256 over salt+password).

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rusqlite::Connection;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use std::time::Duration;
use tracing::{info, warn};

use super::{ApiFailure, AppState, HandlerResult};
use crate::config::ServerConfig;
use crate::db::users::{
    count_users, create_user, find_credentials, get_user, store_refresh_token,
    take_refresh_token, touch_last_login,
};
use crate::db::persons::create_person;
use crate::db::{StoreError, StoreResult};
use crate::entities::{
    LoginCredentials, LoginResponse, PersonInput, PersonType, RefreshRequest, SessionUser,
    TokenClaims, User,
};
use crate::session::decode_claims;

type HmacSha256 = Hmac<Sha256>;

const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;

/// {"alg":"HS256","typ":"JWT"}
const JWT_HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

// ============================================================================
// ACCESS TOKENS
// ============================================================================

pub struct TokenSigner {
    mac: HmacSha256,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(key: &[u8], ttl: Duration) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(TokenSigner {
            mac: HmacSha256::new_from_slice(key)?,
            ttl,
        })
    }

    /// Signer with a key generated now; tokens die with the process
    pub fn with_random_key(ttl: Duration) -> Result<Self, hmac::digest::InvalidLength> {
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(&key, ttl)
    }

    pub fn issue(&self, user: &User) -> String {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> String {
        let claims = TokenClaims {
            id: user.user_id,
            username: user.username.clone(),
            profile_id: user.profile_id,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };
        // TokenClaims only holds numbers and strings
        let payload = serde_json::to_vec(&claims).unwrap_or_default();

        let signing_input = format!("{}.{}", JWT_HEADER, URL_SAFE_NO_PAD.encode(payload));
        let signature = self.sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, ApiFailure> {
        let invalid = || ApiFailure::unauthorized("Invalid token");

        let (signing_input, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let claims = decode_claims(token).map_err(|_| invalid())?;
        if claims.remaining_at(now) <= 0 {
            return Err(ApiFailure::unauthorized("Token expired"));
        }
        Ok(claims)
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

// ============================================================================
// PASSWORDS
// ============================================================================

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    format!(
        "{}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(password_digest(&salt, password))
    )
}

/// Check `password` against a stored "salt$digest"; the digest comparison
/// runs in constant time
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    match (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(digest)) {
        (Ok(salt), Ok(digest)) => {
            password_digest(&salt, password)
                .as_slice()
                .ct_eq(digest.as_slice())
                .into()
        }
        _ => false,
    }
}

fn password_digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

// ============================================================================
// SEEDING
// ============================================================================

/// Create the configured admin account when the users table is empty
///
/// Returns true when an account was created.
pub fn ensure_admin(conn: &Connection, config: &ServerConfig) -> StoreResult<bool> {
    if count_users(conn)? > 0 {
        return Ok(false);
    }

    let person = create_person(
        conn,
        &PersonInput::new("Administrator", Some(PersonType::Individual)),
        "system",
    )?;
    create_user(
        conn,
        person.person_id,
        &config.admin_username,
        &hash_password(&config.admin_password),
        Some(1),
        "system",
    )?;

    info!(username = %config.admin_username, "seeded admin account");
    Ok(true)
}

// ============================================================================
// HANDLERS
// ============================================================================

fn session_user(user: &User) -> SessionUser {
    SessionUser {
        user_id: user.user_id,
        username: user.username.clone(),
        profile_id: user.profile_id,
    }
}

/// New access token plus a stored, single-use refresh token
fn issue_pair(conn: &Connection, state: &AppState, user: &User) -> StoreResult<LoginResponse> {
    let refresh_token = uuid::Uuid::new_v4().to_string();
    store_refresh_token(
        conn,
        &refresh_token,
        user.user_id,
        Utc::now() + state.refresh_token_ttl,
    )?;

    Ok(LoginResponse {
        access_token: state.signer.issue(user),
        refresh_token,
        user: session_user(user),
    })
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> HandlerResult<LoginResponse> {
    let conn = state.db()?;

    let user = match find_credentials(&conn, credentials.username.trim())? {
        Some((user, hash)) if verify_password(&credentials.password, &hash) => user,
        _ => {
            warn!(username = %credentials.username, "login rejected");
            return Err(ApiFailure::unauthorized("Invalid username or password"));
        }
    };

    touch_last_login(&conn, user.user_id)?;
    let response = issue_pair(&conn, &state, &user)?;

    info!(username = %user.username, "login");
    Ok(Json(response))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> HandlerResult<LoginResponse> {
    let conn = state.db()?;

    let Some(user_id) = take_refresh_token(&conn, &request.refresh_token, Utc::now())? else {
        return Err(ApiFailure::unauthorized("Invalid refresh token"));
    };
    let user = match get_user(&conn, user_id) {
        Ok(user) => user,
        Err(StoreError::NotFound { .. }) => {
            return Err(ApiFailure::unauthorized("Invalid refresh token"))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(issue_pair(&conn, &state, &user)?))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> HandlerResult<SessionUser> {
    let conn = state.db()?;
    match get_user(&conn, claims.id) {
        Ok(user) => Ok(Json(session_user(&user))),
        Err(StoreError::NotFound { .. }) => Err(ApiFailure::unauthorized("User no longer exists")),
        Err(e) => Err(e.into()),
    }
}

/// GET /auth/validate; reaching the handler means the token passed
pub async fn validate(Extension(claims): Extension<TokenClaims>) -> Json<Value> {
    Json(json!({ "valid": true, "user": claims.user() }))
}

/// Bearer-token gate for the protected routes
///
/// Verified claims are handed to handlers as `Extension<TokenClaims>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiFailure> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| ApiFailure::unauthorized("Missing bearer token"))?;

    let claims = state.signer.verify(token, Utc::now())?;

    // A deleted account loses access before its token runs out
    {
        let conn = state.db()?;
        match get_user(&conn, claims.id) {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {
                warn!(user_id = claims.id, "token of an inactive account refused");
                return Err(ApiFailure::unauthorized("Account is no longer active"));
            }
            Err(e) => return Err(e.into()),
        }
    }

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
