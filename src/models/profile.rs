//! Profile and organization rows read from the platform database.

use uuid::Uuid;

/// Billing columns of a profile needed to start a Stripe session.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct ProfileBilling {
    pub email: Option<String>,
    pub stripe_customer_id: Option<String>,
}

impl ProfileBilling {
    /// Stripe customer id, treating blank values as absent.
    pub fn customer_id(&self) -> Option<&str> {
        self.stripe_customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Name and address used to greet a user in email.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl Contact {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}
