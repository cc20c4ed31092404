//! Stripe webhook signature verification.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 using the
//! endpoint's signing secret and sends it in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869e7ec...,v0=...
//! ```
//!
//! During secret rotation the header may carry several `v1` entries; any of
//! them matching is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{error::AppError, models::stripe::Event};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "t" => timestamp = value.trim().parse().ok(),
            "v1" => signatures.push(value.trim().to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        AppError::InvalidRequest("Unable to extract timestamp and signatures from header".to_string())
    })?;
    if signatures.is_empty() {
        return Err(AppError::InvalidRequest(
            "No signatures found with expected scheme".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify the signature header against the raw body and parse the event.
///
/// `now` is the current unix time in seconds.
pub fn verify_event(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<Event, AppError> {
    let parsed = parse_header(header)?;

    let expected = compute_signature(secret, parsed.timestamp, payload);
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));

    if !matched {
        return Err(AppError::InvalidRequest(
            "No signatures found matching the expected signature for payload".to_string(),
        ));
    }

    // Only stale events are rejected; a sender clock running ahead is tolerated.
    if now.saturating_sub(parsed.timestamp) > TOLERANCE_SECS {
        return Err(AppError::InvalidRequest(
            "Timestamp outside the tolerance zone".to_string(),
        ));
    }

    serde_json::from_slice(payload).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse webhook payload");
        AppError::InvalidRequest("Invalid webhook payload".to_string())
    })
}
