//! Invite rate limiting with two fixed windows.
//!
//! Every invite email counts once against the inviting user and once against
//! the target address. Both counters live in the database and are bumped by a
//! single statement, so concurrent function instances share the limit.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use super::store::{InviteQuotaHits, Store};
use crate::error::AppError;

/// Limits per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteLimits {
    pub per_caller: u32,
    pub per_email: u32,
    pub window_secs: u64,
}

/// Start of the fixed window containing `now`.
pub fn window_start(now: DateTime<Utc>, window_secs: u64) -> DateTime<Utc> {
    let window = window_secs.max(1) as i64;
    let start = now.timestamp().div_euclid(window) * window;
    Utc.timestamp_opt(start, 0).single().unwrap_or(now)
}

/// Seconds until the window containing `now` closes.
pub fn seconds_until_reset(now: DateTime<Utc>, window_secs: u64) -> u64 {
    let end = window_start(now, window_secs).timestamp() + window_secs.max(1) as i64;
    (end - now.timestamp()).max(1) as u64
}

pub fn caller_bucket(user_id: Uuid) -> String {
    format!("caller:{user_id}")
}

pub fn email_bucket(email: &str) -> String {
    format!("email:{}", email.trim().to_lowercase())
}

/// Whether the counts after consuming one invite are still within limits.
pub fn within_limits(hits: InviteQuotaHits, limits: &InviteLimits) -> bool {
    hits.caller <= i64::from(limits.per_caller) && hits.email <= i64::from(limits.per_email)
}

/// Consume one invite for `caller` to `email`, rejecting with 429 when over either limit.
pub async fn consume_invite(
    store: &dyn Store,
    limits: &InviteLimits,
    caller: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let hits = store
        .consume_invite_quota(
            &caller_bucket(caller),
            &email_bucket(email),
            window_start(now, limits.window_secs),
        )
        .await
        .map_err(|e| AppError::internal("Failed to check invite rate limit", e))?;

    if within_limits(hits, limits) {
        return Ok(());
    }

    tracing::warn!(
        caller = %caller,
        caller_hits = hits.caller,
        email_hits = hits.email,
        "invite rate limited"
    );
    Err(AppError::RateLimited {
        message: "Too many invites, try again later".to_string(),
        retry_after_secs: seconds_until_reset(now, limits.window_secs),
    })
}
