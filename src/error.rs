// Client Error Types
use serde_json::Value;
use thiserror::Error;

/// Message shown when the backend cannot be reached at all
pub const NETWORK_UNREACHABLE_MESSAGE: &str =
    "Unable to reach the server. Make sure the backend is running.";

/// Message shown when the session can no longer be recovered
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

/// Errors surfaced by the API client and the typed endpoint layer.
///
/// `Clone` so that every request queued behind a refresh observes the same
/// outcome as the request that triggered it.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    // No response reached the client (connect failure, DNS, timeout)
    #[error("{message}")]
    Network { message: String, cause: String },

    // Refresh failed, or a replayed request was rejected again
    #[error("{0}")]
    AuthExpired(String),

    // Any other non-success response, passed through for form-level display
    #[error("{detail}")]
    Validation {
        status: u16,
        detail: String,
        body: Option<Value>,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn network(cause: impl Into<String>) -> Self {
        ClientError::Network {
            message: NETWORK_UNREACHABLE_MESSAGE.to_string(),
            cause: cause.into(),
        }
    }

    pub fn auth_expired() -> Self {
        ClientError::AuthExpired(SESSION_EXPIRED_MESSAGE.to_string())
    }

    pub fn validation(status: u16, detail: impl Into<String>, body: Option<Value>) -> Self {
        ClientError::Validation {
            status,
            detail: detail.into(),
            body,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ClientError::Decode(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        ClientError::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        ClientError::Config(message.into())
    }

    /// Build a pass-through error from a non-success backend response body.
    pub fn from_response(status: u16, raw: &[u8]) -> Self {
        let body: Option<Value> = serde_json::from_slice(raw).ok();
        let detail = body
            .as_ref()
            .and_then(extract_detail)
            .or_else(|| {
                let text = String::from_utf8_lossy(raw).trim().to_string();
                (!text.is_empty()).then_some(text)
            })
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        ClientError::validation(status, detail, body)
    }

    /// HTTP status carried by the error, when a response was received
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::AuthExpired(_) => Some(401),
            ClientError::Validation { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get error code for machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Network { .. } => "NETWORK_ERROR",
            ClientError::AuthExpired(_) => "AUTH_EXPIRED",
            ClientError::Validation { .. } => "VALIDATION_ERROR",
            ClientError::Decode(_) => "DECODE_ERROR",
            ClientError::Storage(_) => "STORAGE_ERROR",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ClientError::AuthExpired(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }
}

/// FastAPI reports errors as `{"detail": "..."}` or, for request validation,
/// `{"detail": [{"loc": [...], "msg": "..."}]}`.
fn extract_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg")?.as_str()?;
                    let field = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .and_then(Value::as_str);
                    Some(match field {
                        Some(field) => format!("{}: {}", field, msg),
                        None => msg.to_string(),
                    })
                })
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::decode(err.to_string())
        } else if err.is_builder() {
            ClientError::config(err.to_string())
        } else {
            ClientError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_used_verbatim() {
        let err = ClientError::from_response(400, br#"{"detail":"User already exists"}"#);
        assert_eq!(err.to_string(), "User already exists");
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn list_detail_joins_field_messages() {
        let raw = br#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email address"},{"loc":["body","password"],"msg":"field required"}]}"#;
        let err = ClientError::from_response(422, raw);
        assert_eq!(
            err.to_string(),
            "email: value is not a valid email address; password: field required"
        );
    }

    #[test]
    fn plain_text_and_empty_bodies() {
        let err = ClientError::from_response(502, b"Bad Gateway");
        assert_eq!(err.to_string(), "Bad Gateway");

        let err = ClientError::from_response(500, b"");
        assert_eq!(err.to_string(), "Request failed with status 500");
    }

    #[test]
    fn network_message_differs_from_auth_message() {
        let net = ClientError::network("connection refused");
        let auth = ClientError::auth_expired();
        assert!(net.is_network());
        assert!(auth.is_auth_expired());
        assert_ne!(net.to_string(), auth.to_string());
        assert_eq!(net.status_code(), None);
        assert_eq!(auth.status_code(), Some(401));
    }
}
