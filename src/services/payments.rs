//! Stripe customers, checkout sessions and billing portal sessions.
//!
//! Calls go through `async-stripe`, whose requests carry the API version the
//! crate is generated against (2023-10-16), the same one webhook payloads are
//! parsed against.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::billing::{BillingCycle, Plan},
};

/// Parameters of a subscription checkout for one plan.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutParams {
    pub customer_id: String,
    pub price_id: String,
    pub quantity: u32,
    pub success_url: String,
    pub cancel_url: String,
    pub user_id: Uuid,
    pub plan: Plan,
    pub cycle: BillingCycle,
}

impl CheckoutParams {
    /// Metadata attached to both the session and the subscription it creates.
    pub fn metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("user_id".to_string(), self.user_id.to_string()),
            ("plan".to_string(), self.plan.as_str().to_string()),
            ("billing_cycle".to_string(), self.cycle.as_str().to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

/// Payments processor operations used by the billing endpoints.
#[async_trait]
pub trait Payments: Send + Sync {
    /// Create a customer tagged with the user id. Returns the customer id.
    async fn create_customer(&self, email: Option<&str>, user_id: Uuid) -> Result<String, AppError>;

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, AppError>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError>;
}

/// `Payments` implementation over the Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    client: Option<stripe::Client>,
}

impl StripeClient {
    /// A blank or missing key leaves the client unconfigured; every call then
    /// fails with "Missing STRIPE_SECRET_KEY".
    pub fn new(secret_key: Option<String>) -> Self {
        let client = secret_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(stripe::Client::new);

        Self { client }
    }

    fn client(&self) -> Result<&stripe::Client, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Config("Missing STRIPE_SECRET_KEY".to_string()))
    }

    /// Client whose POSTs carry a fresh idempotency key, so the library's
    /// retries cannot create duplicates.
    fn idempotent_client(&self) -> Result<stripe::Client, AppError> {
        let key = format!("spendnote_{}", Uuid::new_v4());
        Ok(self
            .client()?
            .clone()
            .with_strategy(stripe::RequestStrategy::Idempotent(key)))
    }
}

fn parse_customer_id(id: &str) -> Result<stripe::CustomerId, AppError> {
    id.trim()
        .parse()
        .map_err(|_| upstream(format!("Invalid customer ID: {id}")))
}

fn upstream(message: String) -> AppError {
    AppError::Upstream {
        message,
        detail: None,
    }
}

/// Stripe's own message when it rejected the request, the transport error otherwise.
fn stripe_error(operation: &str, err: stripe::StripeError) -> AppError {
    let message = match &err {
        stripe::StripeError::Stripe(request) => request
            .message
            .clone()
            .unwrap_or_else(|| format!("Stripe returned {}", request.http_status)),
        other => format!("Stripe request failed: {other}"),
    };
    tracing::warn!(operation, error = %err, "stripe call failed");
    upstream(message)
}

#[async_trait]
impl Payments for StripeClient {
    async fn create_customer(&self, email: Option<&str>, user_id: Uuid) -> Result<String, AppError> {
        let client = self.idempotent_client()?;

        let mut params = stripe::CreateCustomer::new();
        params.email = email.map(str::trim).filter(|e| !e.is_empty());
        params.metadata = Some(HashMap::from([("user_id".to_string(), user_id.to_string())]));

        let customer = stripe::Customer::create(&client, params)
            .await
            .map_err(|e| stripe_error("create_customer", e))?;

        Ok(customer.id.to_string())
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, AppError> {
        let client = self.idempotent_client()?;
        let metadata = params.metadata();

        let mut create = stripe::CreateCheckoutSession::new();
        create.customer = Some(parse_customer_id(&params.customer_id)?);
        create.mode = Some(stripe::CheckoutSessionMode::Subscription);
        create.success_url = Some(params.success_url.as_str());
        create.cancel_url = Some(params.cancel_url.as_str());
        create.allow_promotion_codes = Some(true);
        create.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(params.price_id.clone()),
            quantity: Some(u64::from(params.quantity)),
            ..Default::default()
        }]);
        create.subscription_data = Some(stripe::CreateCheckoutSessionSubscriptionData {
            metadata: Some(metadata.clone()),
            ..Default::default()
        });
        create.metadata = Some(metadata);

        let session = stripe::CheckoutSession::create(&client, create)
            .await
            .map_err(|e| stripe_error("create_checkout_session", e))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let client = self.client()?;

        let mut params = stripe::CreateBillingPortalSession::new(parse_customer_id(customer_id)?);
        params.return_url = Some(return_url);

        let session = stripe::BillingPortalSession::create(client, params)
            .await
            .map_err(|e| stripe_error("create_portal_session", e))?;

        Ok(PortalSession { url: session.url })
    }
}
