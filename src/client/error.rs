use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// PingOne error envelope: `{id, code, message, details: [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P1Error {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<P1ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P1ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<P1InnerError>,
}

/// Constraint data attached to a validation failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P1InnerError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_minimum_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_maximum_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_values: Option<Vec<Value>>,
}

impl P1Error {
    pub fn first_detail(&self) -> Option<&P1ErrorDetail> {
        self.details.first()
    }
}

/// Error classification used to decide between retry, warning and failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Token retrieval or refresh failed.
    AuthFailed,
    /// No HTTP response: transport failure, TLS failure or cancellation.
    Unreachable,
    /// The resource does not exist.
    NotFound,
    /// The parent environment of the resource does not exist.
    ParentGone,
    /// A prerequisite is not yet visible to the serving node.
    Propagation,
    /// Validation error targeting an attribute.
    InvalidValue,
    /// Role/scope combination rejected.
    ConflictingScope,
    /// The credential type is managed externally.
    ForbiddenMode,
    /// Any other server or client error.
    ServerError,
}

/// Errors returned by the PingOne client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{}", status_message(*status, error.as_ref(), body))]
    Status {
        status: StatusCode,
        body: String,
        error: Option<P1Error>,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Timed out after {}s: {source}", timeout.as_secs())]
    DeadlineExceeded {
        timeout: Duration,
        #[source]
        source: Box<ApiError>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A pre-flight check refused to submit the request.
    #[error("{0}")]
    Refused(String, ErrorKind),
}

fn status_message(status: StatusCode, error: Option<&P1Error>, body: &str) -> String {
    match error {
        Some(e) if !e.message.is_empty() => e.message.clone(),
        _ if !body.is_empty() => format!("HTTP {}: {}", status.as_u16(), body),
        _ => format!("HTTP {}", status),
    }
}

/// "Actor not authorized": role assignments not yet visible to the API node.
pub const PATTERN_ACTOR_NOT_AUTHORIZED: &str =
    "^The actor attempting to perform the request is not authorized.";
/// Role assignment scope not yet visible.
pub const PATTERN_BROADER_SCOPE: &str = "^Must have role at the same or broader scope";
/// Issuer profile created but not yet visible to the credentials service.
pub const PATTERN_ISSUER_PROFILE_MISSING: &str =
    "^issuerProfile must exist before creating credentialTypes";

impl ApiError {
    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            ApiError::DeadlineExceeded { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Parsed PingOne error envelope, if the response carried one.
    pub fn p1_error(&self) -> Option<&P1Error> {
        match self {
            ApiError::Status { error, .. } => error.as_ref(),
            ApiError::DeadlineExceeded { source, .. } => source.p1_error(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
            || self.p1_error().is_some_and(|e| e.code == "NOT_FOUND")
    }

    /// Whether the error matches one of the known propagation patterns.
    pub fn is_propagation(&self) -> bool {
        super::retry::is_propagation_error(self)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::AuthFailed(_) => ErrorKind::AuthFailed,
            ApiError::Transport(e) if e.status().is_none() => ErrorKind::Unreachable,
            ApiError::Cancelled => ErrorKind::Unreachable,
            ApiError::DeadlineExceeded { source, .. } => source.kind(),
            ApiError::Refused(_, kind) => *kind,
            _ if self.is_propagation() => ErrorKind::Propagation,
            _ if self.is_not_found() => ErrorKind::NotFound,
            _ => {
                let first = self.p1_error().and_then(P1Error::first_detail);
                match first {
                    Some(d) if d.code == "INVALID_VALUE" && d.target.as_deref() == Some("scope") => {
                        ErrorKind::ConflictingScope
                    }
                    Some(d) if d.code == "INVALID_VALUE" => ErrorKind::InvalidValue,
                    _ => ErrorKind::ServerError,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn status_error(status: u16, body: Value) -> ApiError {
        let error = serde_json::from_value::<P1Error>(body.clone()).ok();
        ApiError::Status {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            error,
        }
    }

    #[test]
    fn test_deserialize_envelope() {
        let err: P1Error = serde_json::from_value(json!({
            "id": "6d1f2a3b",
            "code": "INVALID_DATA",
            "message": "The request could not be completed. One or more validation errors were in the request.",
            "details": [{
                "code": "INVALID_VALUE",
                "target": "name",
                "message": "name must be unique",
                "innerError": {"allowedPattern": "^[a-z]+$", "rangeMaximumValue": 10}
            }]
        }))
        .unwrap();

        let detail = err.first_detail().unwrap();
        assert_eq!(detail.target.as_deref(), Some("name"));
        let inner = detail.inner_error.as_ref().unwrap();
        assert_eq!(inner.allowed_pattern.as_deref(), Some("^[a-z]+$"));
        assert_eq!(inner.range_maximum_value, Some(json!(10)));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            status_error(404, json!({"id": "1", "code": "NOT_FOUND", "message": "missing"})).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            status_error(403, json!({
                "id": "1", "code": "ACCESS_FAILED",
                "message": "The actor attempting to perform the request is not authorized."
            }))
            .kind(),
            ErrorKind::Propagation
        );
        assert_eq!(
            status_error(400, json!({
                "id": "1", "code": "INVALID_DATA", "message": "bad",
                "details": [{"code": "INVALID_VALUE", "target": "name", "message": "dup"}]
            }))
            .kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(
            status_error(400, json!({
                "id": "1", "code": "INVALID_DATA", "message": "bad",
                "details": [{"code": "INVALID_VALUE", "target": "scope", "message": "scope"}]
            }))
            .kind(),
            ErrorKind::ConflictingScope
        );
        assert_eq!(status_error(500, json!({"message": "boom"})).kind(), ErrorKind::ServerError);
        assert_eq!(ApiError::Cancelled.kind(), ErrorKind::Unreachable);
        assert_eq!(ApiError::AuthFailed("x".into()).kind(), ErrorKind::AuthFailed);
        assert_eq!(
            ApiError::Refused("managed".into(), ErrorKind::ForbiddenMode).kind(),
            ErrorKind::ForbiddenMode
        );
    }

    #[test]
    fn test_deadline_exceeded_delegates_to_source() {
        let err = ApiError::DeadlineExceeded {
            timeout: Duration::from_secs(600),
            source: Box::new(status_error(404, json!({"code": "NOT_FOUND", "message": "gone"}))),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Timed out after 600s: gone");
    }

    #[test]
    fn test_status_display_without_envelope() {
        let err = ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
            error: None,
        };
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");
    }
}
