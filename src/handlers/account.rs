//! Account deletion handler.

use axum::{Extension, Json, extract::State};
use serde_json::{Value, json};

use crate::{app::AppState, error::AppError, middleware::auth::Caller};

/// Delete the caller's account and everything that would block it.
///
/// # Endpoint
///
/// `POST /functions/v1/delete-account`
///
/// # Order
///
/// Rows are removed in an order that avoids foreign-key failures:
///
/// 1. Organizations the caller owns (memberships of other users cascade)
/// 2. Best effort: audit log references to the caller are cleared
/// 3. Best effort: storage objects owned by the caller
/// 4. The profile row
/// 5. The auth identity
///
/// Nothing is rolled back when a later step fails.
///
/// # Response (200)
///
/// ```json
/// { "success": true }
/// ```
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller.id;
    let store = &state.store;

    let owned_orgs = store
        .owned_org_ids(user_id)
        .await
        .map_err(|e| AppError::internal("Failed to check org memberships", e))?;

    if !owned_orgs.is_empty() {
        store
            .delete_orgs(&owned_orgs)
            .await
            .map_err(|e| AppError::internal("Failed to delete organization(s)", e))?;
        tracing::info!(%user_id, count = owned_orgs.len(), "deleted owned organizations");
    }

    if let Err(e) = store.clear_audit_actor(user_id).await {
        tracing::warn!(%user_id, error = %e, "failed to clear audit log actor");
    }

    if let Err(e) = store.delete_storage_objects(user_id).await {
        tracing::warn!(%user_id, error = %e, "failed to delete storage objects");
    }

    store
        .delete_profile(user_id)
        .await
        .map_err(|e| AppError::internal("Failed to delete profile", e))?;

    state.identity.delete_user(user_id).await?;

    tracing::info!(%user_id, "account deleted");
    Ok(Json(json!({ "success": true })))
}
