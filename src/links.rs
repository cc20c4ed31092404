//! URL and address helpers shared by the billing and invite endpoints.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static LINK_ORIGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^/]+").expect("valid origin pattern"));

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("valid address pattern"));

/// Validate a caller-supplied redirect target for Stripe.
///
/// Returns `fallback` when the candidate is blank, unparseable, not http(s),
/// or (when `allowed_origin` is set) on a different origin.
pub fn normalize_return_url(candidate: &str, fallback: &str, allowed_origin: Option<&str>) -> String {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return fallback.to_string();
    }

    let Ok(parsed) = Url::parse(candidate) else {
        return fallback.to_string();
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return fallback.to_string();
    }

    if let Some(origin) = allowed_origin {
        match Url::parse(origin) {
            Ok(base) if base.origin() == parsed.origin() => {}
            _ => return fallback.to_string(),
        }
    }

    parsed.to_string()
}

/// Point an invite link at the configured app origin, keeping path and query.
pub fn rewrite_link_origin(link: &str, app_url: &str) -> String {
    let app_url = app_url.trim();
    if app_url.is_empty() {
        return link.to_string();
    }
    LINK_ORIGIN
        .replace(link, regex::NoExpand(app_url))
        .into_owned()
}

/// Bare address from a sender that may be written as `Name <address>`.
pub fn sender_address(from: &str) -> String {
    let raw = from.trim();
    ANGLE_ADDRESS
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str())
        .trim()
        .to_string()
}
