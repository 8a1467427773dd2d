//! Room Controller error types.
//!
//! Signaling failures never end a connection: each kind is turned into a
//! negative-result event (or a dropped message) by the dispatcher. HTTP
//! handlers map the same type to a status code via `IntoResponse`. Client
//! messages are generic; details are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Credential failures produced by the identity resolver.
///
/// All of them reject the connection attempt with 403.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `jwt` cookie on the request.
    #[error("no token found")]
    NoTokenFound,

    /// `exp` is in the past.
    #[error("token is expired")]
    Expired,

    /// `nbf` is in the future.
    #[error("token nbf validation failed")]
    NbfInvalid,

    /// `iat` is too far in the future.
    #[error("token iat validation failed")]
    IatInvalid,

    /// Header algorithm is not HS256.
    #[error("algorithm mismatch")]
    AlgoInvalid,

    /// Bad signature, malformed token or missing `user_id`.
    #[error("token is unauthorized")]
    Unauthorized,
}

/// Room Controller error type.
///
/// Maps to HTTP status codes:
/// - `Auth`: 403 Forbidden
/// - `Validation`: 400 Bad Request
/// - `PermissionDenied`: 403 Forbidden
/// - `Conflict`: 409 Conflict
/// - `Upstream`: 502 Bad Gateway
/// - `Delivery`, `Internal`: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RcError {
    /// Credential missing or invalid.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Malformed or missing payload field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Room already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller is not allowed to perform the action (e.g. non-creator recording).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Recording backend unreachable or returned a non-success status.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Adapter could not deliver a message (target gone, mailbox full).
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RcError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RcError::Auth(_) | RcError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            RcError::Validation(_) => StatusCode::BAD_REQUEST,
            RcError::Conflict(_) => StatusCode::CONFLICT,
            RcError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RcError::Delivery(_) | RcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            RcError::Auth(_) => "Forbidden".to_string(),
            RcError::Validation(msg) | RcError::Conflict(msg) | RcError::PermissionDenied(msg) => {
                msg.clone()
            }
            RcError::Upstream(_) => "Recording service is unavailable".to_string(),
            RcError::Delivery(_) | RcError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RcError::Auth(_) => "FORBIDDEN",
            RcError::Validation(_) => "BAD_REQUEST",
            RcError::Conflict(_) => "CONFLICT",
            RcError::PermissionDenied(_) => "PERMISSION_DENIED",
            RcError::Upstream(_) => "UPSTREAM_ERROR",
            RcError::Delivery(_) => "DELIVERY_ERROR",
            RcError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        match &self {
            RcError::Auth(reason) => {
                tracing::debug!(target: "rc.errors", reason = %reason, "Rejecting unauthenticated request");
            }
            RcError::Upstream(reason) => {
                tracing::warn!(target: "rc.errors", reason = %reason, "Upstream failure");
            }
            RcError::Delivery(reason) | RcError::Internal(reason) => {
                tracing::error!(target: "rc.errors", reason = %reason, "Internal failure");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.client_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            RcError::Auth(AuthError::Expired).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RcError::Validation("nickname".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RcError::Conflict("room".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RcError::PermissionDenied("creator only".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RcError::Upstream("timeout".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RcError::Delivery("gone".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_conversion() {
        let err: RcError = AuthError::NoTokenFound.into();
        assert!(matches!(err, RcError::Auth(AuthError::NoTokenFound)));
        assert_eq!(err.to_string(), "Authentication failed: no token found");
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let upstream = RcError::Upstream("connection refused at 10.0.0.7:8882".to_string());
        assert!(!upstream.client_message().contains("10.0.0.7"));

        let internal = RcError::Internal("registry lock poisoned".to_string());
        assert_eq!(internal.client_message(), "An internal error occurred");
    }

    #[tokio::test]
    async fn test_auth_error_response_is_forbidden() {
        let response = RcError::Auth(AuthError::AlgoInvalid).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        assert_eq!(body["error"]["message"], "Forbidden");
    }

    #[tokio::test]
    async fn test_validation_error_response_keeps_message() {
        let response = RcError::Validation("Missing room parameter".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["message"], "Missing room parameter");
    }
}
