//! Shared test harness: in-memory platform fakes and a router driver.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use spendnote_functions::{
    app::{AppState, build_router},
    config::{Config, EmailTransport},
    error::AppError,
    models::{
        billing::{BillingChange, ProfileSelector},
        invite::{Invite, MemberRole},
        profile::{Contact, ProfileBilling},
    },
    services::{
        identity::{AdminError, AuthUser, Identity},
        mailer::{Mailer, OutgoingEmail, SendReceipt},
        payments::{CheckoutParams, CheckoutSession, Payments, PortalSession},
        store::{InviteQuotaHits, Store},
    },
};

pub const CALLER_TOKEN: &str = "token-alice";
pub const CALLER_EMAIL: &str = "alice@example.com";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn caller_id() -> Uuid {
    Uuid::from_u128(0xa11ce)
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/spendnote".to_string(),
        database_max_connections: 5,
        server_port: 3000,
        run_migrations: false,
        supabase_url: "https://project.supabase.co".to_string(),
        supabase_anon_key: "anon".to_string(),
        supabase_service_role_key: "service".to_string(),
        app_base_url: "https://app.spendnote.test".to_string(),
        stripe_secret_key: Some("sk_test_123".to_string()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        stripe_standard_monthly_price_id: Some("price_sm".to_string()),
        stripe_standard_yearly_price_id: Some("price_sy".to_string()),
        stripe_pro_monthly_price_id: Some("price_pm".to_string()),
        stripe_pro_yearly_price_id: Some("price_py".to_string()),
        email_transport: EmailTransport::Smtp,
        smtp_host: Some("email-smtp.eu-west-1.amazonaws.com".to_string()),
        smtp_port: 587,
        smtp_username: Some("user".to_string()),
        smtp_password: Some("pass".to_string()),
        spendnote_email_from: "SpendNote <no-reply@spendnote.app>".to_string(),
        spendnote_app_url: String::new(),
        spendnote_invite_subject: "You have been invited to SpendNote".to_string(),
        invite_limit_per_caller: 20,
        invite_limit_per_email: 5,
        invite_limit_window_secs: 3600,
    }
}

fn db_error(operation: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("{operation} failed"))
}

#[derive(Default)]
pub struct FakeIdentity {
    users: Mutex<HashMap<String, AuthUser>>,
    pub deleted: Mutex<Vec<Uuid>>,
    pub delete_error: Mutex<Option<AdminError>>,
}

impl FakeIdentity {
    pub fn with_caller() -> Self {
        let identity = Self::default();
        identity.add_user(
            CALLER_TOKEN,
            AuthUser {
                id: caller_id(),
                email: Some(CALLER_EMAIL.to_string()),
            },
        );
        identity
    }

    pub fn add_user(&self, token: &str, user: AuthUser) {
        self.users.lock().unwrap().insert(token.to_string(), user);
    }
}

#[async_trait]
impl Identity for FakeIdentity {
    async fn verify(&self, authorization: &str) -> Option<AuthUser> {
        let token = authorization.strip_prefix("Bearer ")?;
        self.users.lock().unwrap().get(token).cloned()
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AdminError> {
        if let Some(err) = self.delete_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.deleted.lock().unwrap().push(user_id);
        Ok(())
    }
}

/// Rows and call log of the fake platform database.
#[derive(Default)]
pub struct StoreState {
    pub profiles: HashMap<Uuid, ProfileBilling>,
    pub contacts: HashMap<Uuid, Contact>,
    pub customers: HashMap<String, Uuid>,
    pub invites: HashMap<String, Invite>,
    pub memberships: HashMap<(Uuid, Uuid), MemberRole>,
    pub org_names: HashMap<Uuid, String>,
    pub managers: HashMap<Uuid, Vec<Contact>>,
    pub owned_orgs: HashMap<Uuid, Vec<Uuid>>,
    pub quota: HashMap<String, i64>,
    pub billing_changes: Vec<(ProfileSelector, BillingChange)>,
    pub stored_customers: Vec<(Uuid, String)>,
    /// Mutating calls in the order they happened.
    pub calls: Vec<String>,
    /// Operations that fail with a database error.
    pub failing: HashSet<&'static str>,
}

#[derive(Default)]
pub struct FakeStore {
    pub state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn with<F: FnOnce(&mut StoreState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }

    fn check(&self, operation: &'static str) -> Result<(), sqlx::Error> {
        if self.state.lock().unwrap().failing.contains(operation) {
            Err(db_error(operation))
        } else {
            Ok(())
        }
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.check("ping")
    }

    async fn profile_billing(&self, user_id: Uuid) -> Result<Option<ProfileBilling>, sqlx::Error> {
        self.check("profile_billing")?;
        Ok(self.state.lock().unwrap().profiles.get(&user_id).cloned())
    }

    async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> Result<(), sqlx::Error> {
        self.check("set_stripe_customer")?;
        self.state
            .lock()
            .unwrap()
            .stored_customers
            .push((user_id, customer_id.to_string()));
        Ok(())
    }

    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<Uuid>, sqlx::Error> {
        self.check("user_for_customer")?;
        Ok(self.state.lock().unwrap().customers.get(customer_id).copied())
    }

    async fn apply_billing_change(
        &self,
        selector: &ProfileSelector,
        change: &BillingChange,
    ) -> Result<u64, sqlx::Error> {
        self.check("apply_billing_change")?;
        self.state
            .lock()
            .unwrap()
            .billing_changes
            .push((selector.clone(), change.clone()));
        Ok(1)
    }

    async fn owned_org_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        self.check("owned_org_ids")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .owned_orgs
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_orgs(&self, org_ids: &[Uuid]) -> Result<(), sqlx::Error> {
        self.check("delete_orgs")?;
        self.record(format!("delete_orgs:{}", org_ids.len()));
        Ok(())
    }

    async fn clear_audit_actor(&self, _user_id: Uuid) -> Result<(), sqlx::Error> {
        self.check("clear_audit_actor")?;
        self.record("clear_audit_actor".to_string());
        Ok(())
    }

    async fn delete_storage_objects(&self, _user_id: Uuid) -> Result<(), sqlx::Error> {
        self.check("delete_storage_objects")?;
        self.record("delete_storage_objects".to_string());
        Ok(())
    }

    async fn delete_profile(&self, _user_id: Uuid) -> Result<(), sqlx::Error> {
        self.check("delete_profile")?;
        self.record("delete_profile".to_string());
        Ok(())
    }

    async fn invite_by_token(&self, token: &str) -> Result<Option<Invite>, sqlx::Error> {
        self.check("invite_by_token")?;
        Ok(self.state.lock().unwrap().invites.get(token).cloned())
    }

    async fn membership_role(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        self.check("membership_role")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .get(&(org_id, user_id))
            .copied())
    }

    async fn contact(&self, user_id: Uuid) -> Result<Option<Contact>, sqlx::Error> {
        self.check("contact")?;
        Ok(self.state.lock().unwrap().contacts.get(&user_id).cloned())
    }

    async fn org_name(&self, org_id: Uuid) -> Result<Option<String>, sqlx::Error> {
        self.check("org_name")?;
        Ok(self.state.lock().unwrap().org_names.get(&org_id).cloned())
    }

    async fn team_managers(&self, org_id: Uuid) -> Result<Vec<Contact>, sqlx::Error> {
        self.check("team_managers")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .managers
            .get(&org_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn consume_invite_quota(
        &self,
        caller_bucket: &str,
        email_bucket: &str,
        _window_start: DateTime<Utc>,
    ) -> Result<InviteQuotaHits, sqlx::Error> {
        self.check("consume_invite_quota")?;
        let mut state = self.state.lock().unwrap();
        let mut bump = |bucket: &str| {
            let hits = state.quota.entry(bucket.to_string()).or_insert(0);
            *hits += 1;
            *hits
        };
        let caller = bump(caller_bucket);
        let email = bump(email_bucket);
        Ok(InviteQuotaHits { caller, email })
    }
}

#[derive(Default)]
pub struct FakePayments {
    pub customers: Mutex<Vec<(Option<String>, Uuid)>>,
    pub checkouts: Mutex<Vec<CheckoutParams>>,
    pub portals: Mutex<Vec<(String, String)>>,
    pub failure: Mutex<Option<String>>,
}

impl FakePayments {
    fn check(&self) -> Result<(), AppError> {
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(AppError::Upstream {
                message,
                detail: None,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Payments for FakePayments {
    async fn create_customer(&self, email: Option<&str>, user_id: Uuid) -> Result<String, AppError> {
        self.check()?;
        self.customers
            .lock()
            .unwrap()
            .push((email.map(str::to_string), user_id));
        Ok("cus_new".to_string())
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, AppError> {
        self.check()?;
        self.checkouts.lock().unwrap().push(params.clone());
        Ok(CheckoutSession {
            id: "cs_test_1".to_string(),
            url: Some("https://checkout.stripe.com/c/pay/cs_test_1".to_string()),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        self.check()?;
        self.portals
            .lock()
            .unwrap()
            .push((customer_id.to_string(), return_url.to_string()));
        Ok(PortalSession {
            url: "https://billing.stripe.com/p/session/test".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub failure: Mutex<Option<String>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, AppError> {
        if let Some(detail) = self.failure.lock().unwrap().clone() {
            return Err(AppError::Upstream {
                message: "Failed to send".to_string(),
                detail: Some(detail),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(SendReceipt {
            code: "250".to_string(),
            message: vec!["Ok".to_string()],
        })
    }
}

/// A decoded response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

pub struct TestApp {
    pub config: Config,
    pub identity: Arc<FakeIdentity>,
    pub store: Arc<FakeStore>,
    pub payments: Arc<FakePayments>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            identity: Arc::new(FakeIdentity::with_caller()),
            store: Arc::new(FakeStore::default()),
            payments: Arc::new(FakePayments::default()),
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    pub fn router(&self) -> Router {
        build_router(AppState::new(
            self.config.clone(),
            self.identity.clone(),
            self.store.clone(),
            self.payments.clone(),
            self.mailer.clone(),
        ))
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }

    /// POST as the default signed-in caller.
    pub async fn post(&self, path: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {CALLER_TOKEN}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_anonymous(&self, path: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}
