//! Stripe webhook payloads.
//!
//! Only the fields the service reads are modelled. Everything is optional or
//! defaulted because Stripe omits or nulls fields freely across API versions.

use std::collections::HashMap;

use chrono::DateTime;
use serde::Deserialize;

use super::billing::{BillingStatus, PriceCatalog, SubscriptionSync};

/// Envelope of every webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// A reference that Stripe sends either as an id or as the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

/// Trimmed id of an optional reference; blank ids count as missing.
fn ref_id(value: &Option<Expandable>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.id().trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn metadata_value(metadata: &Option<HashMap<String, String>>, key: &str) -> Option<String> {
    metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub subscription: Option<Expandable>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CheckoutSession {
    pub fn user_id(&self) -> Option<String> {
        metadata_value(&self.metadata, "user_id")
    }

    pub fn customer_id(&self) -> Option<String> {
        ref_id(&self.customer)
    }

    pub fn subscription_id(&self) -> Option<String> {
        ref_id(&self.subscription)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: Option<bool>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    #[serde(default)]
    pub id: String,
}

impl Subscription {
    pub fn user_id(&self) -> Option<String> {
        metadata_value(&self.metadata, "user_id")
    }

    pub fn customer_id(&self) -> Option<String> {
        ref_id(&self.customer)
    }

    /// Price of the first subscription item.
    pub fn price_id(&self) -> Option<String> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Profile columns describing this subscription.
    pub fn to_sync(&self, catalog: &PriceCatalog) -> SubscriptionSync {
        let price_id = self.price_id();
        let (tier, cycle) = catalog.resolve(price_id.as_deref().unwrap_or_default());
        let subscription_id = Some(self.id.trim().to_string()).filter(|id| !id.is_empty());

        SubscriptionSync {
            customer_id: self.customer_id(),
            subscription_id,
            price_id,
            status: BillingStatus::from_stripe(self.status.as_deref().unwrap_or_default()),
            cycle,
            cancel_at_period_end: self.cancel_at_period_end.unwrap_or(false),
            current_period_end: self
                .current_period_end
                .filter(|secs| *secs != 0)
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            tier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub customer: Option<Expandable>,
}

impl Invoice {
    pub fn customer_id(&self) -> Option<String> {
        ref_id(&self.customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::billing::{BillingCycle, Plan};
    use serde_json::json;

    fn catalog() -> PriceCatalog {
        PriceCatalog::from_ids([
            Some("price_sm".to_string()),
            Some("price_sy".to_string()),
            Some("price_pm".to_string()),
            Some("price_py".to_string()),
        ])
    }

    #[test]
    fn subscription_sync_reads_first_item_price() {
        let sub: Subscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "trialing",
            "cancel_at_period_end": true,
            "current_period_end": 1_700_000_000,
            "items": { "data": [ { "price": { "id": "price_py" } } ] },
            "metadata": { "user_id": " 8a3d " }
        }))
        .unwrap();

        let sync = sub.to_sync(&catalog());
        assert_eq!(sync.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(sync.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(sync.price_id.as_deref(), Some("price_py"));
        assert_eq!(sync.status, BillingStatus::Trialing);
        assert_eq!(sync.tier, Some(Plan::Pro));
        assert_eq!(sync.cycle, Some(BillingCycle::Yearly));
        assert!(sync.cancel_at_period_end);
        assert_eq!(
            sync.current_period_end.unwrap().timestamp(),
            1_700_000_000
        );
        assert_eq!(sub.user_id().as_deref(), Some("8a3d"));
    }

    #[test]
    fn subscription_sync_tolerates_sparse_payload() {
        let sub: Subscription = serde_json::from_value(json!({
            "id": "sub_2",
            "customer": { "id": "cus_2", "object": "customer" },
            "current_period_end": 0,
            "metadata": null
        }))
        .unwrap();

        let sync = sub.to_sync(&catalog());
        assert_eq!(sync.customer_id.as_deref(), Some("cus_2"));
        assert_eq!(sync.price_id, None);
        assert_eq!(sync.tier, None);
        assert_eq!(sync.cycle, None);
        assert_eq!(sync.status, BillingStatus::Active);
        assert_eq!(sync.current_period_end, None);
        assert_eq!(sub.user_id(), None);
    }

    #[test]
    fn checkout_session_ignores_blank_references() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "customer": "cus_9",
            "subscription": "",
            "metadata": { "user_id": "u1", "plan": "pro" }
        }))
        .unwrap();

        assert_eq!(session.customer_id().as_deref(), Some("cus_9"));
        assert_eq!(session.subscription_id(), None);
        assert_eq!(session.user_id().as_deref(), Some("u1"));
    }
}
