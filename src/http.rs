// 🌐 HTTP Client - the single egress point for every service
//
// ApiClient owns the request lifecycle:
// 1. Attach `Authorization: Bearer <token>` when the session holds one
// 2. Apply the per-verb timeout from configuration
// 3. Send exactly once through the Transport (no retries)
// 4. Map the outcome to ApiResult; a 401 tears the session down
//
// The network itself sits behind the Transport trait so tests can script
// responses; ReqwestTransport is the production implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ApiConfig, Timeouts};
use crate::error::{ApiError, ApiResult};
use crate::session::Session;

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transport needs to perform one call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, always starting with '/'
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    pub timeout: Duration,
}

/// Status plus decoded JSON body (Null when empty, String when not JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn new(status: u16, body: Value) -> Self {
        RawResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures where no HTTP response was obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl From<TransportError> for ApiError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => ApiError::Timeout,
            TransportError::Connect(reason) | TransportError::Other(reason) => {
                ApiError::Network(reason)
            }
        }
    }
}

// ============================================================================
// TRANSPORT
// ============================================================================

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport bound to one base URL
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(ReqwestTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Other(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(method, url)
            .timeout(request.timeout)
            .header(reqwest::header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(Self::classify)?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(RawResponse { status, body })
    }
}

// ============================================================================
// API CLIENT
// ============================================================================

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    timeouts: Timeouts,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<Session>, timeouts: Timeouts) -> Self {
        ApiClient {
            transport,
            session,
            timeouts,
        }
    }

    /// Client talking to `config.base_url` over reqwest
    pub fn from_config(config: &ApiConfig, session: Arc<Session>) -> ApiResult<Self> {
        let transport = ReqwestTransport::new(&config.base_url)?;
        Ok(ApiClient::new(Arc::new(transport), session, config.timeouts))
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn timeout_for(&self, method: Method) -> Duration {
        match method {
            Method::Get => self.timeouts.get,
            Method::Post => self.timeouts.post,
            Method::Put => self.timeouts.put,
            Method::Delete => self.timeouts.delete,
        }
    }

    /// Perform one call and return the raw JSON body of a 2xx answer
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> ApiResult<Value> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            query,
            body,
            bearer: self.session.token(),
            timeout: self.timeout_for(method),
        };

        debug!(%method, path, "api request");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, path, error = %e, "api request failed without response");
                return Err(e.into());
            }
        };

        debug!(%method, path, status = response.status, "api response");

        if response.is_success() {
            return Ok(response.body);
        }

        if response.status == 401 {
            info!(%method, path, "unauthorized response, clearing session");
            if let Err(e) = self.session.clear() {
                error!(error = %e, "failed to clear session");
            }
            return Err(ApiError::Unauthorized);
        }

        let error = ApiError::from_status(response.status, &response.body);
        warn!(%method, path, status = response.status, error = %error, "api error");
        Err(error)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> ApiResult<T> {
        let body = self.execute(Method::Get, path, query, None).await?;
        decode(body)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let body = encode(body)?;
        let answer = self.execute(Method::Post, path, Vec::new(), Some(body)).await?;
        decode(answer)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let body = encode(body)?;
        let answer = self.execute(Method::Put, path, Vec::new(), Some(body)).await?;
        decode(answer)
    }

    /// DELETE; whatever the server answers on success is discarded
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.execute(Method::Delete, path, Vec::new(), None).await?;
        Ok(())
    }
}

/// Decode a response body into `T`
pub fn decode<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn encode<B: Serialize + ?Sized>(body: &B) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

// ============================================================================
// TEST SUPPORT
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::AuthConfig;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport answering from a script and recording every request
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(ScriptedTransport::default())
        }

        pub fn respond(&self, status: u16, body: Value) {
            self.script
                .lock()
                .unwrap()
                .push_back(Ok(RawResponse::new(status, body)));
        }

        pub fn fail(&self, error: TransportError) {
            self.script.lock().unwrap().push_back(Err(error));
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn last_request(&self) -> ApiRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    /// Client over a fresh scripted transport and an in-memory session
    pub fn scripted_client() -> (ApiClient, Arc<ScriptedTransport>, Arc<Session>) {
        let transport = ScriptedTransport::new();
        let session = Arc::new(Session::in_memory(&AuthConfig::default()));
        let client = ApiClient::new(transport.clone(), session.clone(), Timeouts::default());
        (client, transport, session)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::config::AuthConfig;
    use crate::session::{token_expiring_in, SessionStorage};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory storage that counts removals of the access token key
    #[derive(Default)]
    struct CountingStorage {
        inner: crate::session::MemoryStorage,
        token_removals: AtomicUsize,
    }

    impl SessionStorage for CountingStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> anyhow::Result<()> {
            if key == "accessToken" {
                self.token_removals.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let (client, transport, session) = scripted_client();
        let token = token_expiring_in(3600);
        session.store_tokens(&token, "refresh").unwrap();
        transport.respond(200, json!({ "ok": true }));

        let body: Value = client.get("/persons", Vec::new()).await.unwrap();

        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(transport.last_request().bearer, Some(token));
        assert_eq!(transport.last_request().method, Method::Get);
    }

    #[tokio::test]
    async fn test_no_bearer_without_session() {
        let (client, transport, _session) = scripted_client();
        transport.respond(200, json!([]));

        let _: Value = client.get("/health", Vec::new()).await.unwrap();
        assert_eq!(transport.last_request().bearer, None);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_once_without_retry() {
        let storage = Arc::new(CountingStorage::default());
        let session = Arc::new(Session::new(storage.clone(), &AuthConfig::default()));
        session.store_tokens(&token_expiring_in(3600), "refresh").unwrap();

        let transport = ScriptedTransport::new();
        transport.respond(401, json!({ "message": "jwt expired" }));
        let client = ApiClient::new(transport.clone(), session.clone(), Timeouts::default());

        let result: ApiResult<Value> = client.get("/movements", Vec::new()).await;

        assert_eq!(result, Err(ApiError::Unauthorized));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(storage.token_removals.load(Ordering::SeqCst), 1);
        assert_eq!(session.token(), None);
        assert_eq!(session.refresh_token(), None);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (client, transport, _session) = scripted_client();
        transport.respond(404, Value::Null);
        transport.respond(422, json!({ "message": "type_name is required" }));
        transport.respond(502, Value::String("Bad Gateway".to_string()));

        let not_found: ApiResult<Value> = client.get("/persons/9", Vec::new()).await;
        assert_eq!(not_found, Err(ApiError::NotFound));

        let invalid: ApiResult<Value> = client.post("/movement-types", &json!({})).await;
        assert_eq!(
            invalid,
            Err(ApiError::Validation {
                message: "type_name is required".to_string()
            })
        );

        let server: ApiResult<Value> = client.get("/health", Vec::new()).await;
        assert_eq!(server, Err(ApiError::Server { status: 502 }));
    }

    #[tokio::test]
    async fn test_transport_failures() {
        let (client, transport, _session) = scripted_client();
        transport.fail(TransportError::Timeout);
        transport.fail(TransportError::Connect("refused".to_string()));

        let timeout: ApiResult<Value> = client.get("/persons", Vec::new()).await;
        assert_eq!(timeout, Err(ApiError::Timeout));

        let network: ApiResult<Value> = client.get("/persons", Vec::new()).await;
        assert!(matches!(network, Err(ApiError::Network(_))));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_per_verb_timeouts() {
        let transport = ScriptedTransport::new();
        let session = Arc::new(Session::in_memory(&AuthConfig::default()));
        let timeouts = Timeouts {
            get: Duration::from_millis(100),
            post: Duration::from_millis(200),
            put: Duration::from_millis(300),
            delete: Duration::from_millis(400),
        };
        let client = ApiClient::new(transport.clone(), session, timeouts);
        transport.respond(200, Value::Null);
        transport.respond(204, Value::Null);

        let _: Value = client.post("/persons", &json!({ "full_name": "Ana" })).await.unwrap();
        client.delete("/persons/1").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].timeout, Duration::from_millis(200));
        assert_eq!(requests[0].body, Some(json!({ "full_name": "Ana" })));
        assert_eq!(requests[1].timeout, Duration::from_millis(400));
        assert_eq!(requests[1].method, Method::Delete);
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let (client, transport, _session) = scripted_client();
        transport.respond(200, json!({ "unexpected": true }));

        let result: ApiResult<Vec<u32>> = client.get("/persons", Vec::new()).await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}
