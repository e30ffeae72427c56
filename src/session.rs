// 🔐 Auth Session - access token, refresh token and user record
//
// The session is an explicit context object: whoever builds the client
// creates one Session, hands an Arc of it to the ApiClient and the
// services, and tears it down with clear(). Nothing here is global.
//
// Persistence sits behind SessionStorage (three string keys), so the CLI
// keeps its login in a JSON file between runs and tests use memory.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::AuthConfig;
use crate::entities::{LoginResponse, SessionUser, TokenClaims};

// ============================================================================
// STORAGE
// ============================================================================

/// Persistent key/value storage for the session (three keys in practice)
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| anyhow!("session storage lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| anyhow!("session storage lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

/// Storage persisted as a flat JSON object, rewritten on every change
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the session file
    ///
    /// A missing file is an empty session; an unreadable one is an error.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file {:?}", path))?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("Session file {:?} is not a JSON object", path))?
            }
        } else {
            HashMap::new()
        };

        Ok(FileStorage {
            path: path.to_path_buf(),
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(values)?;

        // Write-then-rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write session file {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace session file {:?}", self.path))?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| anyhow!("session storage lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| anyhow!("session storage lock poisoned"))?;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

// ============================================================================
// TOKEN DECODING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is not made of three dot-separated parts")]
    Format,
    #[error("token payload is not base64url")]
    Encoding,
    #[error("token payload is not valid claims JSON: {0}")]
    Claims(String),
}

/// Read the claims of a JWT without checking its signature
///
/// The client only needs `exp` to schedule refreshes; the server is the
/// one that verifies signatures.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Format);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| TokenError::Encoding)?;

    serde_json::from_slice(&payload).map_err(|e| TokenError::Claims(e.to_string()))
}

// ============================================================================
// TOKEN STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No access token stored
    Missing,
    /// A token is stored but cannot be decoded
    Malformed,
    Expired,
    /// Still valid but inside the refresh threshold
    ExpiringSoon { remaining: Duration },
    Valid { remaining: Duration },
}

impl TokenStatus {
    /// Only a token outside the refresh threshold counts as authenticated
    pub fn is_authenticated(&self) -> bool {
        matches!(self, TokenStatus::Valid { .. })
    }

    /// A refresh should be attempted (token exists but is about to go, or
    /// already went; the refresh token may still be good)
    pub fn needs_refresh(&self) -> bool {
        matches!(self, TokenStatus::ExpiringSoon { .. } | TokenStatus::Expired)
    }
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct StorageKeys {
    token: String,
    refresh_token: String,
    user: String,
}

pub struct Session {
    storage: Arc<dyn SessionStorage>,
    keys: StorageKeys,
    expiry_threshold: Duration,
}

impl Session {
    pub fn new(storage: Arc<dyn SessionStorage>, config: &AuthConfig) -> Self {
        Session {
            storage,
            keys: StorageKeys {
                token: config.token_key.clone(),
                refresh_token: config.refresh_token_key.clone(),
                user: config.user_key.clone(),
            },
            expiry_threshold: config.expiry_threshold,
        }
    }

    /// Session backed by process memory
    pub fn in_memory(config: &AuthConfig) -> Self {
        Session::new(Arc::new(MemoryStorage::new()), config)
    }

    /// Session backed by the configured session file
    pub fn from_file(config: &AuthConfig) -> Result<Self> {
        let storage = FileStorage::open(&config.session_file)?;
        Ok(Session::new(Arc::new(storage), config))
    }

    pub fn expiry_threshold(&self) -> Duration {
        self.expiry_threshold
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn token(&self) -> Option<String> {
        self.storage.get(&self.keys.token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(&self.keys.refresh_token)
    }

    /// Stored user record; a corrupt record reads as absent
    pub fn user(&self) -> Option<SessionUser> {
        let raw = self.storage.get(&self.keys.user)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        self.token().and_then(|token| decode_claims(&token).ok())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Persist a fresh login: both tokens and the user record
    pub fn store_login(&self, login: &LoginResponse) -> Result<()> {
        self.store_tokens(&login.access_token, &login.refresh_token)?;
        let user = serde_json::to_string(&login.user)?;
        self.storage.set(&self.keys.user, &user)
    }

    /// Replace the token pair (after a refresh)
    pub fn store_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.storage.set(&self.keys.token, access_token)?;
        self.storage.set(&self.keys.refresh_token, refresh_token)
    }

    /// Tear the session down: all three keys are removed
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(&self.keys.token)?;
        self.storage.remove(&self.keys.refresh_token)?;
        self.storage.remove(&self.keys.user)
    }

    // ------------------------------------------------------------------------
    // Expiry
    // ------------------------------------------------------------------------

    pub fn status(&self) -> TokenStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        let Some(token) = self.token() else {
            return TokenStatus::Missing;
        };

        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(_) => return TokenStatus::Malformed,
        };

        let remaining = claims.remaining_at(now);
        if remaining <= 0 {
            return TokenStatus::Expired;
        }

        let remaining = Duration::from_secs(remaining as u64);
        if remaining < self.expiry_threshold {
            TokenStatus::ExpiringSoon { remaining }
        } else {
            TokenStatus::Valid { remaining }
        }
    }

    /// How long until a proactive refresh is due
    ///
    /// None when there is nothing to refresh (no token or malformed);
    /// zero when the token is already inside the threshold or expired.
    pub fn refresh_due_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.status_at(now) {
            TokenStatus::Valid { remaining } => Some(remaining - self.expiry_threshold),
            TokenStatus::ExpiringSoon { .. } | TokenStatus::Expired => Some(Duration::ZERO),
            TokenStatus::Missing | TokenStatus::Malformed => None,
        }
    }
}

/// Build an unsigned token carrying `claims` (tests only)
#[cfg(test)]
pub(crate) fn unsigned_token(claims: &TokenClaims) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{}.{}.signature", header, payload)
}

/// Unsigned token for user 1 expiring `secs` from now (tests only)
#[cfg(test)]
pub(crate) fn token_expiring_in(secs: i64) -> String {
    let now = Utc::now().timestamp();
    unsigned_token(&TokenClaims {
        id: 1,
        username: "admin".to_string(),
        profile_id: Some(1),
        iat: now,
        exp: now + secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(access_token: String) -> LoginResponse {
        LoginResponse {
            access_token,
            refresh_token: "refresh-1".to_string(),
            user: SessionUser {
                user_id: 1,
                username: "admin".to_string(),
                profile_id: Some(1),
            },
        }
    }

    #[test]
    fn test_decode_claims() {
        let token = token_expiring_in(3600);
        let claims = decode_claims(&token).unwrap();

        assert_eq!(claims.id, 1);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_decode_claims_rejects_garbage() {
        assert_eq!(decode_claims("not-a-jwt"), Err(TokenError::Format));
        assert_eq!(decode_claims("a.!!!.c"), Err(TokenError::Encoding));

        let not_claims = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"{\"foo\":1}"));
        assert!(matches!(decode_claims(&not_claims), Err(TokenError::Claims(_))));
    }

    #[test]
    fn test_store_and_clear() {
        let session = Session::in_memory(&AuthConfig::default());
        assert_eq!(session.status(), TokenStatus::Missing);

        session.store_login(&login(token_expiring_in(3600))).unwrap();
        assert!(session.token().is_some());
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(session.user().unwrap().username, "admin");

        session.clear().unwrap();
        assert_eq!(session.token(), None);
        assert_eq!(session.refresh_token(), None);
        assert_eq!(session.user(), None);
    }

    #[test]
    fn test_status_thresholds() {
        let session = Session::in_memory(&AuthConfig::default());
        let now = Utc::now();

        session.store_login(&login(token_expiring_in(3600))).unwrap();
        assert!(session.status_at(now).is_authenticated());

        // 4 minutes left, threshold is 5
        session.store_tokens(&token_expiring_in(240), "r").unwrap();
        let status = session.status_at(now);
        assert!(!status.is_authenticated());
        assert!(status.needs_refresh());

        session.store_tokens(&token_expiring_in(-10), "r").unwrap();
        let status = session.status_at(now);
        assert_eq!(status, TokenStatus::Expired);
        assert!(!status.is_authenticated());
        assert!(status.needs_refresh());

        session.store_tokens("garbage", "r").unwrap();
        assert_eq!(session.status_at(now), TokenStatus::Malformed);
    }

    #[test]
    fn test_refresh_due_in() {
        let session = Session::in_memory(&AuthConfig::default());
        let now = Utc::now();
        assert_eq!(session.refresh_due_in(now), None);

        session.store_tokens(&token_expiring_in(3600), "r").unwrap();
        let due = session.refresh_due_in(now).unwrap();
        // 3600s lifetime - 300s threshold, give or take the clock tick
        assert!(due <= Duration::from_secs(3300) && due >= Duration::from_secs(3298));

        session.store_tokens(&token_expiring_in(100), "r").unwrap();
        assert_eq!(session.refresh_due_in(now), Some(Duration::ZERO));

        // Expired an hour ago: refresh right away
        session.store_tokens(&token_expiring_in(-3600), "r").unwrap();
        assert_eq!(session.refresh_due_in(now), Some(Duration::ZERO));

        session.store_tokens("garbage", "r").unwrap();
        assert_eq!(session.refresh_due_in(now), None);
    }

    #[test]
    fn test_file_storage_persists_across_reopen() {
        let dir = std::env::temp_dir().join(format!("finance-session-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");

        let config = AuthConfig {
            session_file: path.clone(),
            ..AuthConfig::default()
        };

        {
            let session = Session::from_file(&config).unwrap();
            session.store_login(&login(token_expiring_in(3600))).unwrap();
        }

        let reopened = Session::from_file(&config).unwrap();
        assert_eq!(reopened.user().unwrap().user_id, 1);
        assert_eq!(reopened.refresh_token().as_deref(), Some("refresh-1"));

        reopened.clear().unwrap();
        let cleared = Session::from_file(&config).unwrap();
        assert_eq!(cleared.token(), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_session_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("finance-session-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(FileStorage::open(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
