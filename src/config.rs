// ⚙️ Configuration
//
// Defaults live here; every value can be overridden from the environment.
// Binaries call dotenv first, so a local .env file works too.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// API CLIENT
// ============================================================================

/// Time budget per HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub get: Duration,
    pub post: Duration,
    pub put: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let ten_seconds = Duration::from_millis(10_000);
        Timeouts {
            get: ten_seconds,
            post: ten_seconds,
            put: ten_seconds,
            delete: ten_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Serve canned health data instead of calling the server
    pub use_mock: bool,
    pub timeouts: Timeouts,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "http://localhost:3000".to_string(),
            use_mock: false,
            timeouts: Timeouts::default(),
        }
    }
}

// ============================================================================
// AUTH SESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub token_key: String,
    pub refresh_token_key: String,
    pub user_key: String,
    /// Refresh once the access token has less than this left
    pub expiry_threshold: Duration,
    /// Where the CLI persists the session between runs
    pub session_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token_key: "accessToken".to_string(),
            refresh_token_key: "refreshToken".to_string(),
            user_key: "user".to_string(),
            expiry_threshold: Duration::from_secs(5 * 60),
            session_file: PathBuf::from(".finance-session.json"),
        }
    }
}

// ============================================================================
// SERVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub db_path: PathBuf,
    /// HMAC secret for access tokens; random per start when unset
    pub jwt_secret: Option<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Seeded on first start when no user exists
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "0.0.0.0:3000".to_string(),
            db_path: PathBuf::from("finance.db"),
            jwt_secret: None,
            access_token_ttl: Duration::from_secs(60 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
        }
    }
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Defaults overridden by FINANCE_* environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        // API client
        if let Some(url) = lookup("FINANCE_API_BASE_URL") {
            config.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(flag) = lookup("FINANCE_USE_MOCK") {
            config.api.use_mock = parse_bool("FINANCE_USE_MOCK", &flag)?;
        }
        if let Some(ms) = lookup("FINANCE_TIMEOUT_GET_MS") {
            config.api.timeouts.get = parse_millis("FINANCE_TIMEOUT_GET_MS", &ms)?;
        }
        if let Some(ms) = lookup("FINANCE_TIMEOUT_POST_MS") {
            config.api.timeouts.post = parse_millis("FINANCE_TIMEOUT_POST_MS", &ms)?;
        }
        if let Some(ms) = lookup("FINANCE_TIMEOUT_PUT_MS") {
            config.api.timeouts.put = parse_millis("FINANCE_TIMEOUT_PUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("FINANCE_TIMEOUT_DELETE_MS") {
            config.api.timeouts.delete = parse_millis("FINANCE_TIMEOUT_DELETE_MS", &ms)?;
        }

        // Session
        if let Some(secs) = lookup("FINANCE_TOKEN_EXPIRY_THRESHOLD_SECS") {
            config.auth.expiry_threshold =
                parse_secs("FINANCE_TOKEN_EXPIRY_THRESHOLD_SECS", &secs)?;
        }
        if let Some(path) = lookup("FINANCE_SESSION_FILE") {
            config.auth.session_file = PathBuf::from(path);
        }

        // Server
        if let Some(addr) = lookup("FINANCE_SERVER_ADDR") {
            config.server.addr = addr;
        }
        if let Some(path) = lookup("FINANCE_DB_PATH") {
            config.server.db_path = PathBuf::from(path);
        }
        if let Some(secret) = lookup("FINANCE_JWT_SECRET").filter(|s| !s.is_empty()) {
            config.server.jwt_secret = Some(secret);
        }
        if let Some(secs) = lookup("FINANCE_ACCESS_TOKEN_TTL_SECS") {
            config.server.access_token_ttl = parse_secs("FINANCE_ACCESS_TOKEN_TTL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("FINANCE_REFRESH_TOKEN_TTL_SECS") {
            config.server.refresh_token_ttl =
                parse_secs("FINANCE_REFRESH_TOKEN_TTL_SECS", &secs)?;
        }
        if let Some(username) = lookup("FINANCE_ADMIN_USERNAME") {
            config.server.admin_username = username;
        }
        if let Some(password) = lookup("FINANCE_ADMIN_PASSWORD") {
            config.server.admin_password = password;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got {:?}", key, other),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number of milliseconds", key))?;
    Ok(Duration::from_millis(ms))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number of seconds", key))?;
    Ok(Duration::from_secs(secs))
}
