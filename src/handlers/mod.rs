//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives the request body and the verified caller
//! 2. Reads or mutates platform rows, calls Stripe or sends mail
//! 3. Returns a JSON response or an `AppError`

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Account deletion
pub mod account;
/// Stripe checkout and billing portal sessions
pub mod billing;
/// Service health check
pub mod health;
/// Team invite emails
pub mod invites;
/// Welcome and invite-accepted emails
pub mod notifications;
/// Stripe webhook receiver
pub mod webhooks;

/// Answer for OPTIONS requests that are not CORS preflights.
pub async fn preflight() -> &'static str {
    "ok"
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Parse a JSON body. An empty body is treated as `{}`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid JSON body: {e}")))
}
