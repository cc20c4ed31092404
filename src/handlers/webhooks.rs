//! Stripe webhook receiver.
//!
//! Keeps the billing columns of profiles in sync with Stripe. Profiles are
//! found through the `user_id` metadata written at checkout, falling back to
//! the stored Stripe customer id.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    models::{
        billing::{BillingChange, BillingStatus, ProfileSelector},
        stripe::{CheckoutSession, Event, Invoice, Subscription},
    },
    services::webhook_signature,
};

/// Receive a Stripe event.
///
/// # Endpoint
///
/// `POST /functions/v1/stripe-webhook`
///
/// # Headers
///
/// - `Stripe-Signature` (required): `t=<unix>,v1=<hex hmac>`
///
/// # Handled Events
///
/// - `checkout.session.completed`
/// - `customer.subscription.created` / `customer.subscription.updated` / `customer.subscription.deleted`
/// - `invoice.payment_failed` / `invoice.payment_succeeded`
///
/// Other events are acknowledged and ignored.
///
/// # Response (200)
///
/// ```json
/// { "received": true }
/// ```
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = state.config.stripe_webhook_secret()?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing stripe-signature header".to_string()))?;

    let event = webhook_signature::verify_event(&body, signature, secret, Utc::now().timestamp())?;
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "stripe event received");

    handle_event(&state, &event).await?;

    Ok(Json(json!({ "received": true })))
}

fn object<T: serde::de::DeserializeOwned>(event: &Event) -> Result<T, AppError> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        AppError::InvalidRequest(format!("Invalid {} payload: {e}", event.event_type))
    })
}

fn parse_user_id(raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(user_id = raw, "ignoring non-uuid user_id metadata");
            None
        }
    }
}

/// Profile owning a subscription: metadata first, then the customer id.
async fn subscription_owner(state: &AppState, sub: &Subscription) -> Result<Option<Uuid>, AppError> {
    if let Some(user_id) = sub.user_id() {
        return Ok(parse_user_id(&user_id));
    }

    let Some(customer_id) = sub.customer_id() else {
        return Ok(None);
    };

    state
        .store
        .user_for_customer(&customer_id)
        .await
        .map_err(|e| AppError::internal("Failed to find profile for customer", e))
}

async fn apply(state: &AppState, selector: ProfileSelector, change: BillingChange) -> Result<(), AppError> {
    let updated = state
        .store
        .apply_billing_change(&selector, &change)
        .await
        .map_err(|e| AppError::internal("Failed to update profile billing", e))?;

    tracing::info!(?selector, updated, "profile billing updated");
    Ok(())
}

/// Route a verified event to the profile update it implies.
pub async fn handle_event(state: &AppState, event: &Event) -> Result<(), AppError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = object(event)?;
            if let Some(user_id) = session.user_id().as_deref().and_then(parse_user_id) {
                let change = BillingChange::CheckoutCompleted {
                    customer_id: session.customer_id(),
                    subscription_id: session.subscription_id(),
                };
                apply(state, ProfileSelector::User(user_id), change).await?;
            }
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let sub: Subscription = object(event)?;
            if let Some(user_id) = subscription_owner(state, &sub).await? {
                let change = BillingChange::Subscription(sub.to_sync(&state.prices));
                apply(state, ProfileSelector::User(user_id), change).await?;
            }
        }
        "customer.subscription.deleted" => {
            let sub: Subscription = object(event)?;
            if let Some(user_id) = subscription_owner(state, &sub).await? {
                apply(state, ProfileSelector::User(user_id), BillingChange::SubscriptionEnded).await?;
            }
        }
        "invoice.payment_failed" | "invoice.payment_succeeded" => {
            let invoice: Invoice = object(event)?;
            let status = if event.event_type == "invoice.payment_failed" {
                BillingStatus::PastDue
            } else {
                BillingStatus::Active
            };
            if let Some(customer_id) = invoice.customer_id() {
                apply(state, ProfileSelector::Customer(customer_id), BillingChange::Status(status)).await?;
            }
        }
        other => {
            tracing::debug!(event_type = other, "stripe event ignored");
        }
    }

    Ok(())
}
