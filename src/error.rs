//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};

/// Application-wide error type.
///
/// Each variant is a failure category and maps to one HTTP status code.
/// Messages coming from the platform, Stripe or the mail relay are kept
/// as-is so callers can see what the external service reported.
///
/// # Error Categories
///
/// - **Validation**: malformed or incomplete request data (400)
/// - **Authentication / Authorization**: unknown caller (401), caller lacks rights (403)
/// - **Resource**: referenced row not found (404) or in the wrong state (409)
/// - **Rate limit**: invite quota exhausted (429)
/// - **Internal**: missing configuration, failed platform calls (500)
/// - **Upstream**: Stripe or the mail relay rejected the call (502)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed without more specific context.
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// Bearer token is missing or rejected by the auth platform.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Caller is authenticated but not allowed to act on the resource.
    #[error("Not allowed")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Resource exists but is in a state that forbids the operation.
    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    RateLimited { message: String, retry_after_secs: u64 },

    /// A setting required by this endpoint is not configured.
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),

    /// The auth admin API refused an operation; `code` is its error code if any.
    #[error("{message}")]
    AuthAdmin {
        message: String,
        code: Option<String>,
    },

    /// Stripe or the mail relay failed.
    #[error("{message}")]
    Upstream {
        message: String,
        detail: Option<String>,
    },
}

impl AppError {
    /// Wrap an error with a message prefix, e.g. `Failed to load profile: ...`.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        AppError::Internal(format!("{context}: {err}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_)
            | AppError::AuthAdmin { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// { "error": "Human-readable error message" }
/// ```
///
/// Some variants add fields: `code` for auth admin failures, `detail` for
/// upstream failures and `retryAfterSeconds` for rate limiting (which also
/// sets the `Retry-After` header).
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(self.to_string()));

        let mut retry_after = None;
        match &self {
            AppError::AuthAdmin { code, .. } => {
                body.insert("code".to_string(), json!(code));
            }
            AppError::Upstream {
                detail: Some(detail),
                ..
            } => {
                body.insert("detail".to_string(), json!(detail));
            }
            AppError::RateLimited {
                retry_after_secs, ..
            } => {
                body.insert("retryAfterSeconds".to_string(), json!(retry_after_secs));
                retry_after = Some(*retry_after_secs);
            }
            _ => {}
        }

        let mut response = (status, Json(Value::Object(body))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
