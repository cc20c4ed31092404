//! Request bodies of the function endpoints.
//!
//! Browser callers send loosely typed JSON (numbers as strings, missing or
//! null fields), so fields are kept as raw JSON values and normalized by the
//! handlers instead of being rejected during deserialization.

use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /functions/v1/create-checkout-session`.
///
/// ```json
/// { "plan": "pro", "billingCycle": "yearly", "quantity": 3 }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan: Option<Value>,
    pub billing_cycle: Option<Value>,
    pub success_url: Option<Value>,
    pub cancel_url: Option<Value>,
    pub quantity: Option<Value>,
}

/// Body of `POST /functions/v1/create-portal-session`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalRequest {
    pub return_url: Option<Value>,
}

/// Body of `POST /functions/v1/send-invite-email`.
///
/// ```json
/// {
///   "invitedEmail": "new.member@example.com",
///   "inviteLink": "https://spendnote.app/spendnote-invite.html?token=...",
///   "inviteToken": "...",
///   "role": "admin"
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteEmailRequest {
    pub invited_email: Option<Value>,
    pub invite_link: Option<Value>,
    pub invite_token: Option<Value>,
    pub role: Option<Value>,
}

/// Body of `POST /functions/v1/send-invite-accepted-email`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteAcceptedRequest {
    pub invite_token: Option<Value>,
}

/// Body of `POST /functions/v1/send-confirmation-email`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub confirm_url: Option<Value>,
}

/// String form of a loosely typed field, trimmed.
///
/// Missing, `null`, `false`, `0` and empty values become an empty string.
pub fn loose_string(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

/// Seat count for checkout: defaults to 1, capped at 100, fractions dropped.
pub fn normalize_quantity(value: &Option<Value>) -> u32 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    };

    if !n.is_finite() || n <= 0.0 {
        return 1;
    }
    // 0 < n < 1 floors to 0, which Stripe rejects; keep at least one seat.
    n.floor().clamp(1.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_string_handles_json_shapes() {
        assert_eq!(loose_string(&Some(json!("  Pro "))), "Pro");
        assert_eq!(loose_string(&Some(json!(12))), "12");
        assert_eq!(loose_string(&Some(json!(0))), "");
        assert_eq!(loose_string(&Some(Value::Null)), "");
        assert_eq!(loose_string(&None), "");
    }

    #[test]
    fn quantity_defaults_and_caps() {
        assert_eq!(normalize_quantity(&None), 1);
        assert_eq!(normalize_quantity(&Some(json!(-4))), 1);
        assert_eq!(normalize_quantity(&Some(json!("abc"))), 1);
        assert_eq!(normalize_quantity(&Some(json!(7.9))), 7);
        assert_eq!(normalize_quantity(&Some(json!("12"))), 12);
        assert_eq!(normalize_quantity(&Some(json!(5000))), 100);
    }

    #[test]
    fn checkout_request_accepts_camel_case() {
        let request: CheckoutRequest = serde_json::from_value(json!({
            "plan": "standard",
            "billingCycle": "monthly",
            "successUrl": "https://app.example/ok"
        }))
        .unwrap();

        assert_eq!(loose_string(&request.billing_cycle), "monthly");
        assert_eq!(loose_string(&request.success_url), "https://app.example/ok");
        assert!(request.quantity.is_none());
    }
}
