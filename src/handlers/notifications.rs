//! Account lifecycle emails: address confirmation, welcome and invite accepted.

use axum::{Extension, Json, body::Bytes, extract::State};
use serde::Serialize;

use crate::{
    app::AppState,
    error::AppError,
    links::{normalize_return_url, sender_address},
    middleware::auth::Caller,
    models::{
        profile::Contact,
        requests::{ConfirmationRequest, InviteAcceptedRequest, loose_string},
    },
    services::mailer::{OutgoingEmail, SendReceipt},
    templates::{EmailConfirmation, InviteAcceptedEmail, RenderedEmail, WelcomeEmail},
};

use super::parse_body;

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub success: bool,
    pub data: SendReceipt,
}

#[derive(Debug, Serialize)]
pub struct InviteAcceptedResponse {
    pub success: bool,
    pub sent: usize,
}

/// Profile of the caller and the address their mail goes to: profile email
/// first, then the auth identity.
async fn caller_recipient(state: &AppState, caller: &Caller) -> Result<(Contact, String), AppError> {
    let contact = state
        .store
        .contact(caller.id)
        .await
        .map_err(|e| AppError::internal("Failed to load profile", e))?
        .unwrap_or_default();

    let to = contact
        .email()
        .or(caller.email.as_deref())
        .ok_or_else(|| AppError::InvalidRequest("No email address on this account".to_string()))?
        .to_string();

    Ok((contact, to))
}

async fn send_to(state: &AppState, to: String, content: RenderedEmail) -> Result<SendReceipt, AppError> {
    state
        .mailer
        .send(&OutgoingEmail {
            from: sender_address(&state.config.spendnote_email_from),
            to,
            content,
        })
        .await
}

/// Send the welcome email to the caller.
///
/// # Endpoint
///
/// `POST /functions/v1/send-welcome-email`
///
/// The address comes from the caller's profile, falling back to the auth identity.
pub async fn send_welcome_email(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<SentResponse>, AppError> {
    state.config.require_email()?;

    let (contact, to) = caller_recipient(&state, &caller).await?;

    let login_url = state.config.app_page("spendnote-login.html");
    let content = WelcomeEmail {
        full_name: contact.name(),
        login_url: &login_url,
    }
    .render();

    let receipt = send_to(&state, to, content).await?;

    Ok(Json(SentResponse {
        success: true,
        data: receipt,
    }))
}

/// Ask the caller to confirm their email address.
///
/// # Endpoint
///
/// `POST /functions/v1/send-confirmation-email`
///
/// # Request Body
///
/// ```json
/// { "confirmUrl": "https://spendnote.app/spendnote-login.html?confirm=..." }
/// ```
///
/// A link off the app origin is replaced by the login page.
pub async fn send_confirmation_email(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<SentResponse>, AppError> {
    let config = &state.config;
    config.require_email()?;

    let request: ConfirmationRequest = parse_body(&body)?;
    let requested = loose_string(&request.confirm_url);
    if requested.is_empty() {
        return Err(AppError::InvalidRequest("Missing confirmUrl".to_string()));
    }

    let login_url = config.app_page("spendnote-login.html");
    let confirm_url = normalize_return_url(&requested, &login_url, Some(config.app_base()));

    let (contact, to) = caller_recipient(&state, &caller).await?;

    let content = EmailConfirmation {
        full_name: contact.name(),
        confirm_url: &confirm_url,
    }
    .render();

    let receipt = send_to(&state, to, content).await?;

    Ok(Json(SentResponse {
        success: true,
        data: receipt,
    }))
}

/// Tell the owners and admins of a team that the caller accepted their invite.
///
/// # Endpoint
///
/// `POST /functions/v1/send-invite-accepted-email`
///
/// # Request Body
///
/// ```json
/// { "inviteToken": "..." }
/// ```
///
/// # Checks
///
/// - Invite exists (404) and has been accepted (409)
/// - The invite was addressed to the caller (403)
///
/// Managers without an email address are skipped. The first refused message fails the request.
pub async fn send_invite_accepted_email(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<InviteAcceptedResponse>, AppError> {
    let config = &state.config;
    config.require_email()?;

    let request: InviteAcceptedRequest = parse_body(&body)?;
    let token = loose_string(&request.invite_token);
    if token.is_empty() {
        return Err(AppError::InvalidRequest("Missing inviteToken".to_string()));
    }

    let invite = state
        .store
        .invite_by_token(&token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invite not found".to_string()))?;

    if !invite.is_accepted() {
        return Err(AppError::Conflict("Invite is not accepted".to_string()));
    }

    let contact = state.store.contact(caller.id).await?.unwrap_or_default();
    let caller_email = caller
        .email
        .as_deref()
        .or(contact.email())
        .unwrap_or_default()
        .to_string();
    if caller_email.is_empty() || !invite.is_addressed_to(&caller_email) {
        return Err(AppError::Forbidden);
    }

    let org_id = invite
        .org_id
        .ok_or_else(|| AppError::Internal("Invite missing org_id".to_string()))?;
    let org_name = state.store.org_name(org_id).await?;
    let managers = state.store.team_managers(org_id).await?;

    let team_url = config.app_page("spendnote-team.html");
    let from = sender_address(&config.spendnote_email_from);
    let mut sent = 0;

    for manager in &managers {
        let Some(to) = manager.email() else {
            continue;
        };

        let content = InviteAcceptedEmail {
            admin_name: manager.name(),
            accepted_user_name: contact.name(),
            accepted_user_email: &caller_email,
            org_name: org_name.as_deref(),
            team_url: &team_url,
        }
        .render();

        state
            .mailer
            .send(&OutgoingEmail {
                from: from.clone(),
                to: to.to_string(),
                content,
            })
            .await?;
        sent += 1;
    }

    tracing::info!(invite_id = %invite.id, %org_id, sent, "invite accepted notifications sent");
    Ok(Json(InviteAcceptedResponse {
        success: true,
        sent,
    }))
}
