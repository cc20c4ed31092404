//! Table operations against the platform database.
//!
//! The schema (profiles, orgs, memberships, invites, audit log, storage) is
//! owned by the platform. The only table this service creates is
//! `invite_rate_limits`, see `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, postgres::PgArguments, query::Query};
use uuid::Uuid;

use crate::{
    db::DbPool,
    models::{
        billing::{BillingChange, BillingStatus, FREE_TIER, ProfileSelector},
        invite::{Invite, MemberRole},
        profile::{Contact, ProfileBilling},
    },
};

/// Hit counts of the two invite windows after consuming one invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteQuotaHits {
    pub caller: i64,
    pub email: i64,
}

/// Row-level operations the functions perform on the platform database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip to the database.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    async fn profile_billing(&self, user_id: Uuid) -> Result<Option<ProfileBilling>, sqlx::Error>;

    async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> Result<(), sqlx::Error>;

    /// Profile owning a Stripe customer, if any.
    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<Uuid>, sqlx::Error>;

    /// Apply a webhook-driven billing update. Returns the number of profiles touched.
    async fn apply_billing_change(
        &self,
        selector: &ProfileSelector,
        change: &BillingChange,
    ) -> Result<u64, sqlx::Error>;

    /// Organizations in which the user holds the owner role.
    async fn owned_org_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;

    /// Delete organizations; memberships and invites cascade.
    async fn delete_orgs(&self, org_ids: &[Uuid]) -> Result<(), sqlx::Error>;

    async fn clear_audit_actor(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    async fn delete_storage_objects(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    async fn invite_by_token(&self, token: &str) -> Result<Option<Invite>, sqlx::Error>;

    async fn membership_role(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, sqlx::Error>;

    async fn contact(&self, user_id: Uuid) -> Result<Option<Contact>, sqlx::Error>;

    async fn org_name(&self, org_id: Uuid) -> Result<Option<String>, sqlx::Error>;

    /// Owners and admins of an organization.
    async fn team_managers(&self, org_id: Uuid) -> Result<Vec<Contact>, sqlx::Error>;

    /// Count one invite against both fixed windows in a single statement.
    async fn consume_invite_quota(
        &self,
        caller_bucket: &str,
        email_bucket: &str,
        window_start: DateTime<Utc>,
    ) -> Result<InviteQuotaHits, sqlx::Error>;
}

/// `Store` backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Postgres `undefined_column`.
const UNDEFINED_COLUMN: &str = "42703";

fn is_undefined_column(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNDEFINED_COLUMN)
}

fn profile_filter(selector: &ProfileSelector) -> &'static str {
    match selector {
        ProfileSelector::User(_) => "id",
        ProfileSelector::Customer(_) => "stripe_customer_id",
    }
}

fn bind_selector<'q>(
    query: Query<'q, Postgres, PgArguments>,
    selector: &'q ProfileSelector,
) -> Query<'q, Postgres, PgArguments> {
    match selector {
        ProfileSelector::User(id) => query.bind(*id),
        ProfileSelector::Customer(customer_id) => query.bind(customer_id.as_str()),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn profile_billing(&self, user_id: Uuid) -> Result<Option<ProfileBilling>, sqlx::Error> {
        sqlx::query_as::<_, ProfileBilling>(
            "SELECT email, stripe_customer_id FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET stripe_customer_id = $1 WHERE id = $2")
            .bind(customer_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM profiles WHERE stripe_customer_id = $1 LIMIT 1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn apply_billing_change(
        &self,
        selector: &ProfileSelector,
        change: &BillingChange,
    ) -> Result<u64, sqlx::Error> {
        let filter = profile_filter(selector);

        let result = match change {
            BillingChange::CheckoutCompleted {
                customer_id,
                subscription_id,
            } => {
                let sql = format!(
                    "UPDATE profiles
                     SET stripe_customer_id = $1,
                         stripe_subscription_id = $2,
                         billing_status = $3
                     WHERE {filter} = $4"
                );
                let query = sqlx::query(&sql)
                    .bind(customer_id.as_deref())
                    .bind(subscription_id.as_deref())
                    .bind(BillingStatus::Active.as_str());
                bind_selector(query, selector).execute(&self.pool).await?
            }
            BillingChange::Subscription(sync) => {
                // Tier stays as-is when the price is not one of ours.
                let sql = format!(
                    "UPDATE profiles
                     SET stripe_customer_id = $1,
                         stripe_subscription_id = $2,
                         stripe_price_id = $3,
                         billing_status = $4,
                         billing_cycle = $5,
                         stripe_cancel_at_period_end = $6,
                         subscription_current_period_end = $7,
                         subscription_tier = COALESCE($8, subscription_tier)
                     WHERE {filter} = $9"
                );
                let query = sqlx::query(&sql)
                    .bind(sync.customer_id.as_deref())
                    .bind(sync.subscription_id.as_deref())
                    .bind(sync.price_id.as_deref())
                    .bind(sync.status.as_str())
                    .bind(sync.cycle.map(|c| c.as_str()))
                    .bind(sync.cancel_at_period_end)
                    .bind(sync.current_period_end)
                    .bind(sync.tier.map(|t| t.as_str()));
                bind_selector(query, selector).execute(&self.pool).await?
            }
            BillingChange::SubscriptionEnded => {
                let sql = format!(
                    "UPDATE profiles
                     SET subscription_tier = $1,
                         billing_status = $2,
                         stripe_subscription_id = NULL,
                         stripe_price_id = NULL,
                         stripe_cancel_at_period_end = false,
                         billing_cycle = NULL
                     WHERE {filter} = $3"
                );
                let query = sqlx::query(&sql)
                    .bind(FREE_TIER)
                    .bind(BillingStatus::Canceled.as_str());
                bind_selector(query, selector).execute(&self.pool).await?
            }
            BillingChange::Status(status) => {
                let sql = format!("UPDATE profiles SET billing_status = $1 WHERE {filter} = $2");
                let query = sqlx::query(&sql).bind(status.as_str());
                bind_selector(query, selector).execute(&self.pool).await?
            }
        };

        Ok(result.rows_affected())
    }

    async fn owned_org_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT org_id FROM org_memberships WHERE user_id = $1 AND role = 'owner'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_orgs(&self, org_ids: &[Uuid]) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM orgs WHERE id = ANY($1)")
            .bind(org_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_audit_actor(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE audit_log SET actor_id = NULL WHERE actor_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_storage_objects(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        let by_owner = sqlx::query("DELETE FROM storage.objects WHERE owner = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await;

        match by_owner {
            Ok(_) => Ok(()),
            // Newer storage schemas only carry the text `owner_id` column.
            Err(e) if is_undefined_column(&e) => {
                sqlx::query("DELETE FROM storage.objects WHERE owner_id = $1")
                    .bind(user_id.to_string())
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn invite_by_token(&self, token: &str) -> Result<Option<Invite>, sqlx::Error> {
        sqlx::query_as::<_, Invite>(
            "SELECT id, org_id, invited_email, role, status FROM invites WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    async fn membership_role(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        let role: Option<Option<String>> = sqlx::query_scalar(
            "SELECT role FROM org_memberships WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role.map(|r| MemberRole::parse(r.as_deref().unwrap_or_default())))
    }

    async fn contact(&self, user_id: Uuid) -> Result<Option<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>("SELECT id, email, full_name FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn org_name(&self, org_id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let name: Option<Option<String>> = sqlx::query_scalar("SELECT name FROM orgs WHERE id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name.flatten())
    }

    async fn team_managers(&self, org_id: Uuid) -> Result<Vec<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT p.id, p.email, p.full_name
            FROM org_memberships m
            JOIN profiles p ON p.id = m.user_id
            WHERE m.org_id = $1 AND lower(m.role) IN ('owner', 'admin')
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn consume_invite_quota(
        &self,
        caller_bucket: &str,
        email_bucket: &str,
        window_start: DateTime<Utc>,
    ) -> Result<InviteQuotaHits, sqlx::Error> {
        // Expired windows are purged in the same statement.
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            WITH purged AS (
                DELETE FROM invite_rate_limits WHERE window_start < $3
            )
            INSERT INTO invite_rate_limits (bucket, window_start, hits)
            VALUES ($1, $3, 1), ($2, $3, 1)
            ON CONFLICT (bucket, window_start)
            DO UPDATE SET hits = invite_rate_limits.hits + 1
            RETURNING bucket, hits
            "#,
        )
        .bind(caller_bucket)
        .bind(email_bucket)
        .bind(window_start)
        .fetch_all(&self.pool)
        .await?;

        let hits_for = |bucket: &str| {
            rows.iter()
                .find(|(b, _)| b == bucket)
                .map_or(0, |(_, hits)| *hits)
        };

        Ok(InviteQuotaHits {
            caller: hits_for(caller_bucket),
            email: hits_for(email_bucket),
        })
    }
}
