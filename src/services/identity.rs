//! Caller identity and account removal against the platform's auth API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;

/// User behind a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Auth platform operations used by the functions.
#[async_trait]
pub trait Identity: Send + Sync {
    /// Resolve the user for an `Authorization` header value.
    ///
    /// `None` means the platform did not accept the credentials.
    async fn verify(&self, authorization: &str) -> Option<AuthUser>;

    /// Remove the auth identity of a user.
    async fn delete_user(&self, user_id: Uuid) -> Result<(), AdminError>;
}

/// Failure reported by the auth admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminError {
    pub message: String,
    pub code: Option<String>,
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        AppError::AuthAdmin {
            message: format!("Failed to delete user: {}", err.message),
            code: err.code,
        }
    }
}

/// GoTrue error body. Field names differ between endpoints and versions.
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    code: Option<serde_json::Value>,
}

impl GoTrueError {
    fn into_admin_error(self, status: reqwest::StatusCode) -> AdminError {
        let message = self
            .msg
            .or(self.message)
            .or(self.error_description)
            .unwrap_or_else(|| format!("auth API returned {status}"));
        let code = self.error_code.or_else(|| match self.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => None,
        });
        AdminError { message, code }
    }
}

/// Client for the platform's auth (GoTrue) REST API.
#[derive(Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl GoTrueClient {
    pub fn new(
        supabase_url: &str,
        anon_key: &str,
        service_role_key: &str,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }
}

#[async_trait]
impl Identity for GoTrueClient {
    async fn verify(&self, authorization: &str) -> Option<AuthUser> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await;

        let response = match response {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "auth platform rejected token");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "auth platform unreachable");
                return None;
            }
        };

        match response.json::<AuthUser>().await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "unexpected user payload from auth platform");
                None
            }
        }
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AdminError> {
        let response = self
            .http
            .delete(format!("{}/admin/users/{}", self.base_url, user_id))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| AdminError {
                message: e.to_string(),
                code: None,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.json::<GoTrueError>().await.unwrap_or_default();
        Err(body.into_admin_error(status))
    }
}
