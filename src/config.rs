//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.
//!
//! Platform credentials needed by every request are required at startup. Stripe and
//! mail settings are optional so that a partially configured deployment still serves
//! the endpoints that do not need them; those endpoints report the missing setting.

use serde::Deserialize;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): Postgres connection string of the platform database
/// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`, `SUPABASE_SERVICE_ROLE_KEY` (required)
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `STRIPE_*` (optional): Stripe secrets and the four subscription price ids
/// - `SMTP_*` (optional): outgoing mail relay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_true")]
    pub run_migrations: bool,

    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,

    /// Public origin of the web app, used to build and restrict return URLs.
    #[serde(default)]
    pub app_base_url: String,

    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_standard_monthly_price_id: Option<String>,
    pub stripe_standard_yearly_price_id: Option<String>,
    pub stripe_pro_monthly_price_id: Option<String>,
    pub stripe_pro_yearly_price_id: Option<String>,

    #[serde(default)]
    pub email_transport: EmailTransport,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    #[serde(default = "default_email_from")]
    pub spendnote_email_from: String,
    /// When set, replaces the scheme and host of invite links.
    #[serde(default)]
    pub spendnote_app_url: String,
    #[serde(default = "default_invite_subject")]
    pub spendnote_invite_subject: String,

    #[serde(default = "default_invite_limit_per_caller")]
    pub invite_limit_per_caller: u32,
    #[serde(default = "default_invite_limit_per_email")]
    pub invite_limit_per_email: u32,
    #[serde(default = "default_invite_limit_window_secs")]
    pub invite_limit_window_secs: u64,
}

/// How outgoing mail leaves the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransport {
    /// Deliver through the configured SMTP relay.
    #[default]
    Smtp,
    /// Write messages to the log instead of sending them.
    Log,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_from() -> String {
    "no-reply@spendnote.app".to_string()
}

fn default_invite_subject() -> String {
    "You have been invited to SpendNote".to_string()
}

fn default_invite_limit_per_caller() -> u32 {
    20
}

fn default_invite_limit_per_email() -> u32 {
    5
}

fn default_invite_limit_window_secs() -> u64 {
    3600
}

/// Treat unset and blank variables the same way.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Stripe API secret, or the error every Stripe-backed endpoint reports without it.
    pub fn stripe_secret(&self) -> Result<&str, AppError> {
        non_empty(&self.stripe_secret_key)
            .ok_or_else(|| AppError::Config("Missing STRIPE_SECRET_KEY".to_string()))
    }

    /// Webhook signing secret. The webhook also needs the API secret to be present.
    pub fn stripe_webhook_secret(&self) -> Result<&str, AppError> {
        match (
            non_empty(&self.stripe_secret_key),
            non_empty(&self.stripe_webhook_secret),
        ) {
            (Some(_), Some(secret)) => Ok(secret),
            _ => Err(AppError::Config(
                "Missing Stripe webhook secrets".to_string(),
            )),
        }
    }

    /// Names of SMTP settings that must be set before mail can be sent.
    pub fn missing_email_settings(&self) -> Vec<&'static str> {
        if self.email_transport == EmailTransport::Log {
            return Vec::new();
        }

        let mut missing = Vec::new();
        if non_empty(&self.smtp_host).is_none() {
            missing.push("SMTP_HOST");
        }
        if non_empty(&self.smtp_username).is_none() {
            missing.push("SMTP_USERNAME");
        }
        if non_empty(&self.smtp_password).is_none() {
            missing.push("SMTP_PASSWORD");
        }
        missing
    }

    /// Fail with a configuration error when mail cannot be sent.
    pub fn require_email(&self) -> Result<(), AppError> {
        let missing = self.missing_email_settings();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "Missing email settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// App origin without a trailing slash, falling back to the public site.
    pub fn app_base(&self) -> &str {
        let trimmed = self.app_base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            "https://spendnote.app"
        } else {
            trimmed
        }
    }

    /// Build an absolute link to a page of the web app.
    pub fn app_page(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.app_base(), path_and_query.trim_start_matches('/'))
    }

    /// Origin restriction for caller-supplied return URLs, if any.
    pub fn return_url_origin(&self) -> Option<&str> {
        let trimmed = self.app_base_url.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Price ids in catalog order: standard monthly, standard yearly, pro monthly, pro yearly.
    pub fn price_ids(&self) -> [Option<String>; 4] {
        [
            &self.stripe_standard_monthly_price_id,
            &self.stripe_standard_yearly_price_id,
            &self.stripe_pro_monthly_price_id,
            &self.stripe_pro_yearly_price_id,
        ]
        .map(|v| non_empty(v).map(str::to_string))
    }
}
