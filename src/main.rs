//! SpendNote Functions - Main Application Entry Point
//!
//! Serves the backend functions of the SpendNote web app under `/functions/v1/`.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: platform PostgreSQL with sqlx (async queries)
//! - **Authentication**: bearer tokens verified against the auth platform
//! - **Billing**: Stripe via async-stripe
//! - **Email**: SMTP relay via lettre
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations (unless disabled)
//! 4. Build platform clients and the HTTP router
//! 5. Start server on configured port

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use spendnote_functions::{
    app::{AppState, build_router},
    config::{Config, EmailTransport},
    db,
    services::{
        identity::GoTrueClient,
        mailer::{LogMailer, Mailer, SmtpMailer},
        payments::StripeClient,
        store::PgStore,
    },
};

/// Pick the mail transport. Incomplete SMTP settings fall back to logging so
/// the rest of the service still starts; mail endpoints report what is missing.
fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    if config.email_transport == EmailTransport::Log {
        tracing::info!("Email transport: log");
        return Ok(Arc::new(LogMailer));
    }

    match (&config.smtp_host, &config.smtp_username, &config.smtp_password) {
        (Some(host), Some(user), Some(pass)) if config.missing_email_settings().is_empty() => {
            let mailer = SmtpMailer::new(host.trim(), config.smtp_port, user.trim(), pass)?;
            tracing::info!(host = %host, port = config.smtp_port, "Email transport: smtp");
            Ok(Arc::new(mailer))
        }
        _ => {
            tracing::warn!(
                missing = ?config.missing_email_settings(),
                "SMTP settings incomplete, email endpoints will be unavailable"
            );
            Ok(Arc::new(LogMailer))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    if config.run_migrations {
        db::run_migrations(&pool).await?;
        tracing::info!("Database migrations complete");
    }

    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set, billing endpoints will be unavailable");
    }

    let identity = GoTrueClient::new(
        &config.supabase_url,
        &config.supabase_anon_key,
        &config.supabase_service_role_key,
    )?;
    let payments = StripeClient::new(config.stripe_secret_key.clone());
    let mailer = build_mailer(&config)?;
    let store = PgStore::new(pool);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(
        config,
        Arc::new(identity),
        Arc::new(store),
        Arc::new(payments),
        mailer,
    );
    let app = build_router(state);

    // Bind to network address and start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
