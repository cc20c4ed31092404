//! Subscription plans, billing cycles and the price catalog.
//!
//! Stripe only knows price ids. The catalog maps the four configured price
//! ids onto two axes (plan tier and billing cycle) in both directions:
//! checkout picks a price for a plan/cycle pair, webhooks resolve the pair
//! back from the price on a subscription.

use chrono::{DateTime, Utc};

/// Paid subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Standard,
    Pro,
}

impl Plan {
    /// Parse a caller-supplied plan name (trimmed, case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "standard" => Some(Plan::Standard),
            "pro" => Some(Plan::Pro),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Standard => "standard",
            Plan::Pro => "pro",
        }
    }
}

/// Tier written to a profile when its subscription ends.
pub const FREE_TIER: &str = "free";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "monthly" => Some(BillingCycle::Monthly),
            "yearly" => Some(BillingCycle::Yearly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

/// Billing status stored on a profile, mirroring Stripe subscription statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl BillingStatus {
    /// Map a Stripe status onto a known value. Unknown statuses count as active.
    pub fn from_stripe(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "trialing" => BillingStatus::Trialing,
            "past_due" => BillingStatus::PastDue,
            "canceled" => BillingStatus::Canceled,
            "unpaid" => BillingStatus::Unpaid,
            "incomplete" => BillingStatus::Incomplete,
            "incomplete_expired" => BillingStatus::IncompleteExpired,
            "paused" => BillingStatus::Paused,
            _ => BillingStatus::Active,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BillingStatus::Trialing => "trialing",
            BillingStatus::Active => "active",
            BillingStatus::PastDue => "past_due",
            BillingStatus::Canceled => "canceled",
            BillingStatus::Unpaid => "unpaid",
            BillingStatus::Incomplete => "incomplete",
            BillingStatus::IncompleteExpired => "incomplete_expired",
            BillingStatus::Paused => "paused",
        }
    }
}

/// The four configured subscription prices.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    pub standard_monthly: Option<String>,
    pub standard_yearly: Option<String>,
    pub pro_monthly: Option<String>,
    pub pro_yearly: Option<String>,
}

impl PriceCatalog {
    /// Build from ids in the order standard monthly, standard yearly, pro monthly, pro yearly.
    pub fn from_ids([standard_monthly, standard_yearly, pro_monthly, pro_yearly]: [Option<String>; 4]) -> Self {
        Self {
            standard_monthly,
            standard_yearly,
            pro_monthly,
            pro_yearly,
        }
    }

    /// Price id configured for a plan/cycle pair.
    pub fn price_for(&self, plan: Plan, cycle: BillingCycle) -> Option<&str> {
        let slot = match (plan, cycle) {
            (Plan::Standard, BillingCycle::Monthly) => &self.standard_monthly,
            (Plan::Standard, BillingCycle::Yearly) => &self.standard_yearly,
            (Plan::Pro, BillingCycle::Monthly) => &self.pro_monthly,
            (Plan::Pro, BillingCycle::Yearly) => &self.pro_yearly,
        };
        slot.as_deref().filter(|id| !id.is_empty())
    }

    /// Resolve tier and cycle independently from a price id.
    ///
    /// Either axis is `None` when the id is blank or not one of the configured prices.
    pub fn resolve(&self, price_id: &str) -> (Option<Plan>, Option<BillingCycle>) {
        let raw = price_id.trim();
        if raw.is_empty() {
            return (None, None);
        }

        let is = |slot: &Option<String>| slot.as_deref() == Some(raw);

        let plan = if is(&self.standard_monthly) || is(&self.standard_yearly) {
            Some(Plan::Standard)
        } else if is(&self.pro_monthly) || is(&self.pro_yearly) {
            Some(Plan::Pro)
        } else {
            None
        };

        let cycle = if is(&self.standard_monthly) || is(&self.pro_monthly) {
            Some(BillingCycle::Monthly)
        } else if is(&self.standard_yearly) || is(&self.pro_yearly) {
            Some(BillingCycle::Yearly)
        } else {
            None
        };

        (plan, cycle)
    }
}

/// Subscription state copied from Stripe onto a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSync {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub status: BillingStatus,
    pub cycle: Option<BillingCycle>,
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<DateTime<Utc>>,
    /// Left untouched on the profile when the price is unknown.
    pub tier: Option<Plan>,
}

/// Billing-related profile update produced by a webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingChange {
    /// Checkout finished: link customer and subscription, mark active.
    CheckoutCompleted {
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    /// Subscription created or updated.
    Subscription(SubscriptionSync),
    /// Subscription deleted: back to the free tier.
    SubscriptionEnded,
    /// Invoice outcome changes only the status.
    Status(BillingStatus),
}

/// Which profile rows a billing change applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSelector {
    User(uuid::Uuid),
    Customer(String),
}
