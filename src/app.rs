//! Shared application state and the HTTP router.

use std::sync::Arc;

use axum::{
    Router,
    handler::Handler,
    http::{HeaderName, Method, header},
    middleware as axum_middleware,
    routing::{MethodRouter, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers,
    middleware,
    models::billing::PriceCatalog,
    services::{identity::Identity, mailer::Mailer, payments::Payments, store::Store},
};

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub prices: Arc<PriceCatalog>,
    pub identity: Arc<dyn Identity>,
    pub store: Arc<dyn Store>,
    pub payments: Arc<dyn Payments>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        config: Config,
        identity: Arc<dyn Identity>,
        store: Arc<dyn Store>,
        payments: Arc<dyn Payments>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let prices = PriceCatalog::from_ids(config.price_ids());
        Self {
            config: Arc::new(config),
            prices: Arc::new(prices),
            identity,
            store,
            payments,
            mailer,
        }
    }
}

/// A function endpoint: POST runs the handler, OPTIONS answers preflight,
/// any other method gets a JSON 405.
fn function_route<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    post(handler)
        .options(handlers::preflight)
        .fallback(handlers::method_not_allowed)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
            HeaderName::from_static("stripe-signature"),
        ])
}

/// Build the router with every function endpoint.
pub fn build_router(state: AppState) -> Router {
    // Functions called by signed-in users from the web app
    let caller_routes = Router::new()
        .route(
            "/functions/v1/create-checkout-session",
            function_route(handlers::billing::create_checkout_session),
        )
        .route(
            "/functions/v1/create-portal-session",
            function_route(handlers::billing::create_portal_session),
        )
        .route(
            "/functions/v1/delete-account",
            function_route(handlers::account::delete_account),
        )
        .route(
            "/functions/v1/send-invite-email",
            function_route(handlers::invites::send_invite_email),
        )
        .route(
            "/functions/v1/send-welcome-email",
            function_route(handlers::notifications::send_welcome_email),
        )
        .route(
            "/functions/v1/send-confirmation-email",
            function_route(handlers::notifications::send_confirmation_email),
        )
        .route(
            "/functions/v1/send-invite-accepted-email",
            function_route(handlers::notifications::send_invite_accepted_email),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_caller,
        ));

    Router::new()
        // Public routes (no caller identity)
        .route("/health", get(handlers::health::health_check))
        .route(
            "/functions/v1/stripe-webhook",
            function_route(handlers::webhooks::stripe_webhook),
        )
        .merge(caller_routes)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
