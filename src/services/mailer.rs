//! Outgoing email.
//!
//! `SmtpMailer` relays through an authenticated SMTP endpoint (the SES SMTP
//! interface in production). `LogMailer` only writes the message to the log
//! and is meant for local development.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use serde::Serialize;

use crate::{error::AppError, templates::RenderedEmail};

/// A single-recipient message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub content: RenderedEmail,
}

/// What the relay answered when it accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub code: String,
    pub message: Vec<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, AppError>;
}

fn send_failed(detail: impl std::fmt::Display) -> AppError {
    AppError::Upstream {
        message: "Failed to send".to_string(),
        detail: Some(detail.to_string()),
    }
}

/// Build the MIME message with HTML and plain-text alternatives.
fn build_message(email: &OutgoingEmail) -> Result<Message, AppError> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid sender address '{}': {e}", email.from)))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| AppError::InvalidRequest(format!("Invalid recipient address '{}': {e}", email.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.content.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            email.content.text.clone(),
            email.content.html.clone(),
        ))
        .map_err(send_failed)
}

/// Mailer relaying through SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, AppError> {
        let message = build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            tracing::warn!(to = %email.to, error = %e, "smtp relay rejected message");
            send_failed(e)
        })?;

        tracing::info!(to = %email.to, subject = %email.content.subject, "email sent");
        Ok(SendReceipt {
            code: response.code().to_string(),
            message: response.message().map(str::to_string).collect(),
        })
    }
}

/// Mailer that logs messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, AppError> {
        // Still build the message so address errors surface in development.
        build_message(email)?;

        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.content.subject,
            text = %email.content.text,
            "email logged, not sent"
        );
        Ok(SendReceipt {
            code: "250".to_string(),
            message: vec!["logged".to_string()],
        })
    }
}
