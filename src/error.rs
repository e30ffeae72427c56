// ❗ Client errors
//
// Every failed API call ends up as one ApiError. The category comes from
// the HTTP status (or from the transport when no response arrived), and
// each category carries one fixed user-facing message. Services never
// display anything: the presentation layer asks for notification().

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 401 - the session has been torn down
    #[error("unauthorized")]
    Unauthorized,

    /// 403
    #[error("forbidden")]
    Forbidden,

    /// 404
    #[error("not found")]
    NotFound,

    /// 400 / 422 - message from the server when it sent one
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// 5xx
    #[error("server error ({status})")]
    Server { status: u16 },

    /// Any other non-success status
    #[error("unexpected status {status}")]
    Status { status: u16 },

    /// No answer within the verb's time budget
    #[error("request timed out")]
    Timeout,

    /// The server could not be reached
    #[error("network unreachable: {0}")]
    Network(String),

    /// A response arrived but its body did not have the expected shape
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Rejected client-side before any request was made
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session could not be written to its storage
    #[error("session storage failure: {0}")]
    Storage(String),
}

const MSG_UNAUTHORIZED: &str = "Session expired. Please log in again.";
const MSG_FORBIDDEN: &str = "You do not have permission to perform this action.";
const MSG_NOT_FOUND: &str = "Resource not found.";
const MSG_VALIDATION: &str = "Invalid data. Check the information provided.";
const MSG_SERVER: &str = "Internal server error. Please try again later.";
const MSG_OTHER: &str = "An error occurred. Please try again.";
const MSG_TIMEOUT: &str = "The request timed out. Please try again.";
const MSG_NETWORK: &str = "Could not connect to the server. Check your connection.";
const MSG_DECODE: &str = "An error occurred in the request.";
const MSG_STORAGE: &str = "Could not save the session on this device.";

impl ApiError {
    /// Classify a non-success response
    ///
    /// The body is only consulted for the validation message.
    pub fn from_status(status: u16, body: &Value) -> ApiError {
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            400 | 422 => ApiError::Validation {
                message: body
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(MSG_VALIDATION)
                    .to_string(),
            },
            500..=599 => ApiError::Server { status },
            _ => ApiError::Status { status },
        }
    }

    /// HTTP status this error came from, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Forbidden => Some(403),
            ApiError::NotFound => Some(404),
            ApiError::Server { status } | ApiError::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// The message to show the user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized => MSG_UNAUTHORIZED.to_string(),
            ApiError::Forbidden => MSG_FORBIDDEN.to_string(),
            ApiError::NotFound => MSG_NOT_FOUND.to_string(),
            ApiError::Validation { message } => message.clone(),
            ApiError::Server { .. } => MSG_SERVER.to_string(),
            ApiError::Status { .. } => MSG_OTHER.to_string(),
            ApiError::Timeout => MSG_TIMEOUT.to_string(),
            ApiError::Network(_) => MSG_NETWORK.to_string(),
            ApiError::Decode(_) => MSG_DECODE.to_string(),
            ApiError::InvalidInput(message) => message.clone(),
            ApiError::Storage(_) => MSG_STORAGE.to_string(),
        }
    }

    pub fn storage(error: anyhow::Error) -> ApiError {
        ApiError::Storage(format!("{:#}", error))
    }

    pub fn notification(&self) -> Notification {
        Notification::error(self.user_message())
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient message for the user (toast, status line, stderr, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Notification {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    /// Error notification for a failed result, nothing for success
    pub fn from_result<T>(result: &ApiResult<T>) -> Option<Notification> {
        result.as_ref().err().map(ApiError::notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_status_categories() {
        assert_eq!(ApiError::from_status(401, &Value::Null), ApiError::Unauthorized);
        assert_eq!(ApiError::from_status(403, &Value::Null), ApiError::Forbidden);
        assert_eq!(ApiError::from_status(404, &Value::Null), ApiError::NotFound);
        assert_eq!(ApiError::from_status(500, &Value::Null), ApiError::Server { status: 500 });
        assert_eq!(ApiError::from_status(503, &Value::Null), ApiError::Server { status: 503 });
        assert_eq!(ApiError::from_status(409, &Value::Null), ApiError::Status { status: 409 });
    }

    #[test]
    fn test_validation_message_from_body() {
        let error = ApiError::from_status(422, &json!({ "message": "status_name is required" }));
        assert_eq!(error.user_message(), "status_name is required");

        let fallback = ApiError::from_status(400, &json!({}));
        assert_eq!(fallback.user_message(), MSG_VALIDATION);
    }

    #[test]
    fn test_timeout_and_server_errors_differ() {
        assert_ne!(ApiError::Timeout.user_message(), ApiError::Server { status: 504 }.user_message());
        assert_eq!(ApiError::Timeout.status(), None);
        assert_eq!(ApiError::Server { status: 504 }.status(), Some(504));
    }

    #[test]
    fn test_notification() {
        let notification = ApiError::Forbidden.notification();
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.message, MSG_FORBIDDEN);

        let ok: ApiResult<u32> = Ok(1);
        assert_eq!(Notification::from_result(&ok), None);

        let failed: ApiResult<u32> = Err(ApiError::Network("refused".to_string()));
        assert_eq!(
            Notification::from_result(&failed).map(|n| n.message),
            Some(MSG_NETWORK.to_string())
        );
    }
}
