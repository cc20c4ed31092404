mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use spendnote_functions::{
    models::billing::{BillingChange, BillingCycle, BillingStatus, Plan, ProfileSelector},
    services::webhook_signature::compute_signature,
};
use uuid::Uuid;

use common::{TestApp, TestResponse, WEBHOOK_SECRET, caller_id};

const WEBHOOK: &str = "/functions/v1/stripe-webhook";

fn event(event_type: &str, object: Value) -> String {
    json!({ "id": "evt_1", "type": event_type, "data": { "object": object } }).to_string()
}

async fn deliver(app: &TestApp, payload: &str) -> TestResponse {
    let timestamp = Utc::now().timestamp();
    let signature = compute_signature(WEBHOOK_SECRET, timestamp, payload.as_bytes());
    deliver_with_header(app, payload, &format!("t={timestamp},v1={signature}")).await
}

async fn deliver_with_header(app: &TestApp, payload: &str, header: &str) -> TestResponse {
    app.send(
        Request::builder()
            .method(Method::POST)
            .uri(WEBHOOK)
            .header("stripe-signature", header)
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await
}

fn changes(app: &TestApp) -> Vec<(ProfileSelector, BillingChange)> {
    app.store.state.lock().unwrap().billing_changes.clone()
}

#[tokio::test]
async fn checkout_completed_links_customer() {
    let app = TestApp::new();
    let payload = event(
        "checkout.session.completed",
        json!({
            "customer": "cus_1",
            "subscription": { "id": "sub_1" },
            "metadata": { "user_id": caller_id().to_string() }
        }),
    );

    let res = deliver(&app, &payload).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "received": true }));
    assert_eq!(
        changes(&app),
        vec![(
            ProfileSelector::User(caller_id()),
            BillingChange::CheckoutCompleted {
                customer_id: Some("cus_1".to_string()),
                subscription_id: Some("sub_1".to_string()),
            }
        )]
    );
}

#[tokio::test]
async fn checkout_without_user_metadata_is_ignored() {
    let app = TestApp::new();
    let payload = event("checkout.session.completed", json!({ "customer": "cus_1" }));

    let res = deliver(&app, &payload).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(changes(&app).is_empty());
}

#[tokio::test]
async fn subscription_update_syncs_profile_found_by_customer() {
    let app = TestApp::new();
    app.store.with(|s| {
        s.customers.insert("cus_1".to_string(), caller_id());
    });
    let payload = event(
        "customer.subscription.updated",
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "past_due",
            "cancel_at_period_end": true,
            "current_period_end": 1_767_225_600,
            "items": { "data": [ { "price": { "id": "price_py" } } ] }
        }),
    );

    let res = deliver(&app, &payload).await;

    assert_eq!(res.status, StatusCode::OK);
    let recorded = changes(&app);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, ProfileSelector::User(caller_id()));
    let BillingChange::Subscription(sync) = &recorded[0].1 else {
        panic!("expected a subscription sync, got {:?}", recorded[0].1);
    };
    assert_eq!(sync.customer_id.as_deref(), Some("cus_1"));
    assert_eq!(sync.subscription_id.as_deref(), Some("sub_1"));
    assert_eq!(sync.price_id.as_deref(), Some("price_py"));
    assert_eq!(sync.status, BillingStatus::PastDue);
    assert_eq!(sync.cycle, Some(BillingCycle::Yearly));
    assert_eq!(sync.tier, Some(Plan::Pro));
    assert!(sync.cancel_at_period_end);
    assert_eq!(
        sync.current_period_end,
        Utc.timestamp_opt(1_767_225_600, 0).single()
    );
}

#[tokio::test]
async fn subscription_metadata_takes_precedence_over_customer() {
    let app = TestApp::new();
    let other = Uuid::from_u128(42);
    app.store.with(|s| {
        s.customers.insert("cus_1".to_string(), other);
    });
    let payload = event(
        "customer.subscription.created",
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "mystery",
            "metadata": { "user_id": caller_id().to_string() },
            "items": { "data": [ { "price": { "id": "price_unknown" } } ] }
        }),
    );

    deliver(&app, &payload).await;

    let recorded = changes(&app);
    assert_eq!(recorded[0].0, ProfileSelector::User(caller_id()));
    let BillingChange::Subscription(sync) = &recorded[0].1 else {
        panic!("expected a subscription sync");
    };
    assert_eq!(sync.status, BillingStatus::Active);
    assert_eq!(sync.tier, None);
    assert_eq!(sync.cycle, None);
}

#[tokio::test]
async fn subscription_deleted_returns_profile_to_free() {
    let app = TestApp::new();
    let payload = event(
        "customer.subscription.deleted",
        json!({ "id": "sub_1", "metadata": { "user_id": caller_id().to_string() } }),
    );

    deliver(&app, &payload).await;

    assert_eq!(
        changes(&app),
        vec![(ProfileSelector::User(caller_id()), BillingChange::SubscriptionEnded)]
    );
}

#[tokio::test]
async fn invoice_outcomes_update_status_by_customer() {
    let app = TestApp::new();

    deliver(&app, &event("invoice.payment_failed", json!({ "customer": "cus_9" }))).await;
    deliver(&app, &event("invoice.payment_succeeded", json!({ "customer": "cus_9" }))).await;

    assert_eq!(
        changes(&app),
        vec![
            (
                ProfileSelector::Customer("cus_9".to_string()),
                BillingChange::Status(BillingStatus::PastDue)
            ),
            (
                ProfileSelector::Customer("cus_9".to_string()),
                BillingChange::Status(BillingStatus::Active)
            ),
        ]
    );
}

#[tokio::test]
async fn unrelated_events_are_acknowledged() {
    let app = TestApp::new();

    let res = deliver(&app, &event("customer.created", json!({ "id": "cus_1" }))).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(changes(&app).is_empty());
}

#[tokio::test]
async fn database_failure_asks_stripe_to_retry() {
    let app = TestApp::new();
    app.store.with(|s| {
        s.failing.insert("apply_billing_change");
    });

    let res = deliver(&app, &event("invoice.payment_failed", json!({ "customer": "cus_9" }))).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn rejects_bad_signature() {
    let app = TestApp::new();
    let payload = event("invoice.payment_failed", json!({ "customer": "cus_9" }));
    let timestamp = Utc::now().timestamp();

    let res = deliver_with_header(&app, &payload, &format!("t={timestamp},v1=deadbeef")).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(changes(&app).is_empty());
}

#[tokio::test]
async fn rejects_stale_timestamp() {
    let app = TestApp::new();
    let payload = event("invoice.payment_failed", json!({ "customer": "cus_9" }));
    let timestamp = Utc::now().timestamp() - 3600;
    let signature = compute_signature(WEBHOOK_SECRET, timestamp, payload.as_bytes());

    let res = deliver_with_header(&app, &payload, &format!("t={timestamp},v1={signature}")).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Timestamp outside the tolerance zone");
}

#[tokio::test]
async fn accepts_timestamp_ahead_of_local_clock() {
    let app = TestApp::new();
    let payload = event("invoice.payment_failed", json!({ "customer": "cus_9" }));
    let timestamp = Utc::now().timestamp() + 301;
    let signature = compute_signature(WEBHOOK_SECRET, timestamp, payload.as_bytes());

    let res = deliver_with_header(&app, &payload, &format!("t={timestamp},v1={signature}")).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(changes(&app).len(), 1);
}

#[tokio::test]
async fn missing_signature_header_is_a_bad_request() {
    let app = TestApp::new();

    let res = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri(WEBHOOK)
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Missing stripe-signature header");
}

#[tokio::test]
async fn missing_webhook_secret_is_a_server_error() {
    let mut config = common::test_config();
    config.stripe_webhook_secret = None;
    let app = TestApp::with_config(config);

    let res = deliver(&app, &event("invoice.payment_failed", json!({}))).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "Missing Stripe webhook secrets");
}
