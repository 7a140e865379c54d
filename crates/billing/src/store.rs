//! Subscription store
//!
//! Read/write contract for the per-tenant subscription record. The overwrite
//! policy lives entirely behind `upsert`: one row per tenant, conflict target
//! `tenant_id`, every reconciled field replaced. Swapping this for an
//! append-only ledger would not touch any caller.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reviewloop_shared::{ProviderKind, Subscription, SubscriptionStatus};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// Fields written on reconciliation
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub tenant_id: String,
    pub provider: ProviderKind,
    pub provider_subscription_id: String,
    pub plan_name: String,
    pub status: SubscriptionStatus,
    /// Provider-reported status, lower-cased
    pub raw_status: String,
    pub current_period_start: Option<OffsetDateTime>,
    pub current_period_end: Option<OffsetDateTime>,
    pub metadata: serde_json::Value,
}

/// Narrow status transition written by the manage actions
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: SubscriptionStatus,
    /// Provider-reported status, lower-cased
    pub raw_status: String,
    /// Set on cancellation; cleared on reactivation
    pub cancelled_at: Option<OffsetDateTime>,
}

impl StatusChange {
    pub fn cancelled(at: OffsetDateTime) -> Self {
        Self {
            status: SubscriptionStatus::Cancelled,
            raw_status: "cancelled".to_string(),
            cancelled_at: Some(at),
        }
    }

    pub fn suspended() -> Self {
        Self {
            status: SubscriptionStatus::Suspended,
            raw_status: "suspended".to_string(),
            cancelled_at: None,
        }
    }

    pub fn activated() -> Self {
        Self {
            status: SubscriptionStatus::Active,
            raw_status: "active".to_string(),
            cancelled_at: None,
        }
    }
}

/// Storage contract for subscription records.
///
/// `get` returning `None` is the expected steady state for a tenant who has
/// never subscribed, not an error.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> BillingResult<Option<Subscription>>;

    async fn find_by_provider_ref(
        &self,
        provider: ProviderKind,
        provider_subscription_id: &str,
    ) -> BillingResult<Option<Subscription>>;

    /// Insert or fully overwrite the tenant's record.
    async fn upsert(&self, sub: NewSubscription) -> BillingResult<Subscription>;

    /// Status-only transition, filtered by tenant and provider. Returns the
    /// updated row, or `None` when no matching row exists.
    async fn update_status(
        &self,
        tenant_id: &str,
        provider: ProviderKind,
        change: StatusChange,
    ) -> BillingResult<Option<Subscription>>;

    /// Remove the tenant's record; returns the number of rows deleted.
    async fn delete_for_tenant(&self, tenant_id: &str) -> BillingResult<u64>;
}

// =============================================================================
// Postgres implementation
// =============================================================================

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn get(&self, tenant_id: &str) -> BillingResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sub)
    }

    async fn find_by_provider_ref(
        &self,
        provider: ProviderKind,
        provider_subscription_id: &str,
    ) -> BillingResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE provider = $1 AND provider_subscription_id = $2",
        )
        .bind(provider.as_str())
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sub)
    }

    async fn upsert(&self, sub: NewSubscription) -> BillingResult<Subscription> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions
                (id, tenant_id, provider, provider_subscription_id, plan_name,
                 status, raw_status, current_period_start, current_period_end,
                 metadata, cancelled_at, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, NOW(), NOW())
            ON CONFLICT (tenant_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                provider_subscription_id = EXCLUDED.provider_subscription_id,
                plan_name = EXCLUDED.plan_name,
                status = EXCLUDED.status,
                raw_status = EXCLUDED.raw_status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                metadata = EXCLUDED.metadata,
                cancelled_at = NULL,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&sub.tenant_id)
        .bind(sub.provider.as_str())
        .bind(&sub.provider_subscription_id)
        .bind(&sub.plan_name)
        .bind(sub.status.as_str())
        .bind(&sub.raw_status)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(&sub.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_status(
        &self,
        tenant_id: &str,
        provider: ProviderKind,
        change: StatusChange,
    ) -> BillingResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $3, raw_status = $4, cancelled_at = $5, updated_at = NOW()
            WHERE tenant_id = $1 AND provider = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(provider.as_str())
        .bind(change.status.as_str())
        .bind(&change.raw_status)
        .bind(change.cancelled_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_for_tenant(&self, tenant_id: &str) -> BillingResult<u64> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// In-memory implementation (tests, local development without Postgres)
// =============================================================================

#[derive(Default)]
pub struct MemorySubscriptionStore {
    rows: Mutex<HashMap<String, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BillingResult<std::sync::MutexGuard<'_, HashMap<String, Subscription>>> {
        self.rows
            .lock()
            .map_err(|_| BillingError::Storage("subscription store poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn get(&self, tenant_id: &str) -> BillingResult<Option<Subscription>> {
        Ok(self.lock()?.get(tenant_id).cloned())
    }

    async fn find_by_provider_ref(
        &self,
        provider: ProviderKind,
        provider_subscription_id: &str,
    ) -> BillingResult<Option<Subscription>> {
        Ok(self
            .lock()?
            .values()
            .find(|s| {
                s.provider == provider.as_str()
                    && s.provider_subscription_id == provider_subscription_id
            })
            .cloned())
    }

    async fn upsert(&self, sub: NewSubscription) -> BillingResult<Subscription> {
        let now = OffsetDateTime::now_utc();
        let mut rows = self.lock()?;
        let (id, created_at) = rows
            .get(&sub.tenant_id)
            .map(|existing| (existing.id, existing.created_at))
            .unwrap_or((Uuid::new_v4(), now));

        let row = Subscription {
            id,
            tenant_id: sub.tenant_id.clone(),
            provider: sub.provider.as_str().to_string(),
            provider_subscription_id: sub.provider_subscription_id,
            plan_name: sub.plan_name,
            status: sub.status.as_str().to_string(),
            raw_status: sub.raw_status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancelled_at: None,
            metadata: sub.metadata,
            created_at,
            updated_at: now,
        };
        rows.insert(sub.tenant_id, row.clone());
        Ok(row)
    }

    async fn update_status(
        &self,
        tenant_id: &str,
        provider: ProviderKind,
        change: StatusChange,
    ) -> BillingResult<Option<Subscription>> {
        let mut rows = self.lock()?;
        match rows.get_mut(tenant_id) {
            Some(row) if row.provider == provider.as_str() => {
                row.status = change.status.as_str().to_string();
                row.raw_status = change.raw_status;
                row.cancelled_at = change.cancelled_at;
                row.updated_at = OffsetDateTime::now_utc();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_for_tenant(&self, tenant_id: &str) -> BillingResult<u64> {
        Ok(self.lock()?.remove(tenant_id).map(|_| 1).unwrap_or(0))
    }
}
