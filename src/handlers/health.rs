//! Liveness and configuration check.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{app::AppState, error::AppError};

/// Whether an optional integration has the settings it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Configured,
    Missing,
}

impl Readiness {
    fn from_ok<T, E>(result: Result<T, E>) -> Self {
        if result.is_ok() {
            Readiness::Configured
        } else {
            Readiness::Missing
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Stripe secret key present
    pub billing: Readiness,
    /// Mail relay settings present
    pub email: Readiness,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "billing": "configured",
///   "email": "missing",
///   "timestamp": "2026-01-21T19:00:00Z"
/// }
/// ```
///
/// Fails with 500 when the database does not answer. Missing Stripe or mail
/// settings do not fail the check; the endpoints that need them report it.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| AppError::internal("Database unreachable", e))?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        billing: Readiness::from_ok(state.config.stripe_secret()),
        email: Readiness::from_ok(state.config.require_email()),
        timestamp: Utc::now(),
    }))
}
