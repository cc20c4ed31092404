//! Caller identity middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the `Authorization` header
//! 2. Ask the auth platform which user the token belongs to
//! 3. Inject the caller into the request
//! 4. Reject unknown callers with HTTP 401

use crate::{app::AppState, error::AppError};
use axum::{
    extract::{Request, State},
    http::{Method, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Authenticated user attached to protected requests.
///
/// Handlers extract it with `Extension<Caller>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,

    /// Address on the auth identity; profiles may carry a different one.
    pub email: Option<String>,
}

/// Bearer verification middleware.
///
/// The header is forwarded verbatim so the platform applies its own token
/// rules (expiry, revocation, signing keys).
///
/// # Returns
///
/// - `Ok(Response)` if the platform accepted the token (calls next handler)
/// - `Err(AppError::NotAuthenticated)` otherwise (returns 401)
pub async fn require_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Preflight and the 405 fallback must answer without a token.
    if request.method() != Method::POST {
        return Ok(next.run(request).await);
    }

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(AppError::NotAuthenticated)?;

    let user = state
        .identity
        .verify(authorization)
        .await
        .ok_or(AppError::NotAuthenticated)?;

    request.extensions_mut().insert(Caller {
        id: user.id,
        email: user.email.filter(|e| !e.trim().is_empty()),
    });

    Ok(next.run(request).await)
}
