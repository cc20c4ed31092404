//! Team invite email handler.

use axum::{Extension, Json, body::Bytes, extract::State};
use chrono::Utc;
use serde::Serialize;

use crate::{
    app::AppState,
    error::AppError,
    links::{rewrite_link_origin, sender_address},
    middleware::auth::Caller,
    models::{
        invite::MemberRole,
        requests::{InviteEmailRequest, loose_string},
    },
    services::{
        mailer::{OutgoingEmail, SendReceipt},
        rate_limit::{self, InviteLimits},
    },
    templates::InviteEmail,
};

use super::parse_body;

#[derive(Debug, Serialize)]
pub struct InviteEmailResponse {
    pub success: bool,
    pub data: SendReceipt,
}

/// Send the email for a pending invite created by the web app.
///
/// # Endpoint
///
/// `POST /functions/v1/send-invite-email`
///
/// # Request Body
///
/// ```json
/// {
///   "invitedEmail": "new.member@example.com",
///   "inviteLink": "https://spendnote.app/spendnote-invite.html?token=...",
///   "inviteToken": "...",
///   "role": "user"
/// }
/// ```
///
/// # Checks
///
/// - Invite exists (404), is pending (409) and is addressed to `invitedEmail` (400)
/// - Caller is owner or admin of the invite's organization (403)
/// - Caller and recipient are within their invite quotas (429)
///
/// # Errors
///
/// - **502**: the mail relay refused the message (`detail` carries its answer)
pub async fn send_invite_email(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<InviteEmailResponse>, AppError> {
    let config = &state.config;
    config.require_email()?;

    let request: InviteEmailRequest = parse_body(&body)?;
    let invited_email = loose_string(&request.invited_email).to_lowercase();
    let invite_link = loose_string(&request.invite_link);
    let invite_token = loose_string(&request.invite_token);
    let role = match loose_string(&request.role) {
        r if r.is_empty() => MemberRole::User,
        r => MemberRole::parse(&r),
    };

    if invited_email.is_empty() || invite_link.is_empty() || invite_token.is_empty() {
        return Err(AppError::InvalidRequest(
            "Missing invitedEmail / inviteLink / inviteToken".to_string(),
        ));
    }

    let invite = state
        .store
        .invite_by_token(&invite_token)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "invite lookup failed");
            AppError::NotFound("Invite not found".to_string())
        })?
        .ok_or_else(|| AppError::NotFound("Invite not found".to_string()))?;

    if !invite.is_pending() {
        return Err(AppError::Conflict("Invite is not pending".to_string()));
    }
    if !invite.is_addressed_to(&invited_email) {
        return Err(AppError::InvalidRequest("Invite email mismatch".to_string()));
    }
    let org_id = invite
        .org_id
        .ok_or_else(|| AppError::Internal("Invite missing org_id".to_string()))?;

    let caller_role = state
        .store
        .membership_role(org_id, caller.id)
        .await
        .map_err(|e| {
            tracing::warn!(%org_id, user_id = %caller.id, error = %e, "membership lookup failed");
            AppError::Forbidden
        })?;
    if !caller_role.is_some_and(MemberRole::manages_team) {
        return Err(AppError::Forbidden);
    }

    let limits = InviteLimits {
        per_caller: config.invite_limit_per_caller,
        per_email: config.invite_limit_per_email,
        window_secs: config.invite_limit_window_secs,
    };
    rate_limit::consume_invite(state.store.as_ref(), &limits, caller.id, &invited_email, Utc::now()).await?;

    let inviter = match state.store.contact(caller.id).await {
        Ok(Some(contact)) => contact
            .name()
            .or(contact.email())
            .map(str::to_string)
            .or_else(|| caller.email.clone()),
        Ok(None) => caller.email.clone(),
        Err(e) => {
            tracing::warn!(user_id = %caller.id, error = %e, "inviter profile lookup failed");
            caller.email.clone()
        }
    };

    let link = rewrite_link_origin(&invite_link, &config.spendnote_app_url);
    let content = InviteEmail {
        inviter_line: inviter.as_deref().unwrap_or_default(),
        role,
        invite_link: &link,
        subject: &config.spendnote_invite_subject,
    }
    .render();

    let receipt = state
        .mailer
        .send(&OutgoingEmail {
            from: sender_address(&config.spendnote_email_from),
            to: invited_email,
            content,
        })
        .await?;

    tracing::info!(invite_id = %invite.id, %org_id, "invite email sent");
    Ok(Json(InviteEmailResponse {
        success: true,
        data: receipt,
    }))
}
