//! Stripe checkout and billing portal handlers.
//!
//! - POST /functions/v1/create-checkout-session - Start a subscription checkout
//! - POST /functions/v1/create-portal-session - Open the Stripe billing portal

use axum::{Extension, Json, body::Bytes, extract::State};
use serde::Serialize;

use crate::{
    app::AppState,
    error::AppError,
    links::normalize_return_url,
    middleware::auth::Caller,
    models::{
        billing::{BillingCycle, Plan},
        profile::ProfileBilling,
        requests::{CheckoutRequest, PortalRequest, loose_string, normalize_quantity},
    },
    services::payments::CheckoutParams,
};

use super::parse_body;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub url: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub success: bool,
    pub url: String,
}

async fn load_profile(state: &AppState, caller: &Caller) -> Result<ProfileBilling, AppError> {
    state
        .store
        .profile_billing(caller.id)
        .await
        .map_err(|e| AppError::internal("Failed to load profile", e))?
        .ok_or_else(|| AppError::Internal("Failed to load profile: profile not found".to_string()))
}

/// Start a Stripe Checkout session for a subscription.
///
/// # Request Body
///
/// ```json
/// {
///   "plan": "standard",
///   "billingCycle": "yearly",
///   "quantity": 2,
///   "successUrl": "https://spendnote.app/spendnote-user-settings.html?billing=success",
///   "cancelUrl": "https://spendnote.app/spendnote-pricing.html?billing=cancel"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// { "success": true, "url": "https://checkout.stripe.com/c/pay/cs_...", "sessionId": "cs_..." }
/// ```
///
/// # Process
///
/// 1. Normalize plan, cycle, quantity and return URLs
/// 2. Look up the configured price for the plan/cycle pair
/// 3. Reuse the profile's Stripe customer or create one and store its id
/// 4. Create the checkout session with the caller id in its metadata
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, AppError> {
    state.config.stripe_secret()?;

    let request: CheckoutRequest = parse_body(&body)?;
    let (Some(plan), Some(cycle)) = (
        Plan::parse(&loose_string(&request.plan)),
        BillingCycle::parse(&loose_string(&request.billing_cycle)),
    ) else {
        return Err(AppError::InvalidRequest(
            "Invalid plan or billingCycle".to_string(),
        ));
    };
    let quantity = normalize_quantity(&request.quantity);

    let price_id = state.prices.price_for(plan, cycle).ok_or_else(|| {
        AppError::Config(format!(
            "Price ID not configured for {}/{}",
            plan.as_str(),
            cycle.as_str()
        ))
    })?;

    let config = &state.config;
    let success_url = normalize_return_url(
        &loose_string(&request.success_url),
        &config.app_page("spendnote-user-settings.html?billing=success"),
        config.return_url_origin(),
    );
    let cancel_url = normalize_return_url(
        &loose_string(&request.cancel_url),
        &config.app_page("spendnote-pricing.html?billing=cancel"),
        config.return_url_origin(),
    );

    let profile = load_profile(&state, &caller).await?;

    let customer_id = match profile.customer_id() {
        Some(existing) => existing.to_string(),
        None => {
            let email = profile
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .or(caller.email.as_deref());
            let created = state.payments.create_customer(email, caller.id).await?;

            if !created.is_empty() {
                // The session still works without the stored id; the webhook links it later.
                if let Err(e) = state.store.set_stripe_customer(caller.id, &created).await {
                    tracing::warn!(user_id = %caller.id, error = %e, "failed to store stripe customer id");
                }
            }
            created
        }
    };

    let session = state
        .payments
        .create_checkout_session(&CheckoutParams {
            customer_id,
            price_id: price_id.to_string(),
            quantity,
            success_url,
            cancel_url,
            user_id: caller.id,
            plan,
            cycle,
        })
        .await?;

    tracing::info!(
        user_id = %caller.id,
        plan = plan.as_str(),
        cycle = cycle.as_str(),
        quantity,
        session_id = %session.id,
        "checkout session created"
    );

    Ok(Json(CheckoutResponse {
        success: true,
        url: session.url,
        session_id: session.id,
    }))
}

/// Open a Stripe billing portal session for the caller's customer.
///
/// # Request Body
///
/// ```json
/// { "returnUrl": "https://spendnote.app/spendnote-user-settings.html" }
/// ```
///
/// The body may be empty; the return URL then defaults to the settings page.
///
/// # Errors
///
/// - **400**: the caller has never been a Stripe customer
pub async fn create_portal_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<PortalResponse>, AppError> {
    state.config.stripe_secret()?;

    let request: PortalRequest = parse_body(&body)?;
    let config = &state.config;
    let return_url = normalize_return_url(
        &loose_string(&request.return_url),
        &config.app_page("spendnote-user-settings.html?billing=portal"),
        config.return_url_origin(),
    );

    let profile = load_profile(&state, &caller).await?;
    let customer_id = profile.customer_id().ok_or_else(|| {
        AppError::InvalidRequest("No Stripe customer found for this account.".to_string())
    })?;

    let session = state
        .payments
        .create_portal_session(customer_id, &return_url)
        .await?;

    Ok(Json(PortalResponse {
        success: true,
        url: session.url,
    }))
}
