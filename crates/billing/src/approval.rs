//! Approval reconciliation
//!
//! The only place authoritative subscription state enters the system. After
//! the payer returns from the provider's hosted approval page, the front end
//! posts the provider-issued id here; we re-fetch the subscription from the
//! provider, gate on the active status, and overwrite the tenant's record.
//!
//! At-least-once semantics: a second call with the same inputs re-fetches and
//! re-upserts identical data. Concurrent calls race on the upsert and resolve
//! last-write-wins, which is acceptable because both hold the same
//! authoritative provider state.

use std::sync::Arc;

use reviewloop_shared::{Subscription, SubscriptionStatus};
use serde_json::json;

use crate::catalog;
use crate::error::{BillingError, BillingResult};
use crate::provider::ProviderHandle;
use crate::store::{NewSubscription, SubscriptionStore};

/// Outcome of a successful reconciliation
#[derive(Debug, Clone)]
pub struct ReconciledSubscription {
    /// Canonical provider subscription id
    pub id: String,
    /// Normalized status, lower-case
    pub status: String,
    pub plan_name: String,
    /// The stored record
    pub subscription: Subscription,
}

pub struct ApprovalService {
    provider: ProviderHandle,
    store: Arc<dyn SubscriptionStore>,
}

impl ApprovalService {
    pub fn new(provider: ProviderHandle, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { provider, store }
    }

    pub async fn reconcile(
        &self,
        provider_subscription_id: &str,
        tenant_id: &str,
        plan_ref: &str,
    ) -> BillingResult<ReconciledSubscription> {
        let remote = self
            .provider
            .fetch_subscription(provider_subscription_id)
            .await?;

        let provider = self.provider.kind();
        let status = SubscriptionStatus::normalize(provider, &remote.raw_status);
        if !status.is_active() {
            tracing::warn!(
                tenant_id = %tenant_id,
                subscription_id = %remote.id,
                raw_status = %remote.raw_status,
                "Rejecting approval for non-active subscription"
            );
            return Err(BillingError::SubscriptionNotActive(remote.raw_status));
        }

        let plan_name = catalog::display_name(plan_ref);

        let stored = self
            .store
            .upsert(NewSubscription {
                tenant_id: tenant_id.to_string(),
                provider,
                provider_subscription_id: remote.id.clone(),
                plan_name: plan_name.clone(),
                status,
                raw_status: remote.raw_status.to_lowercase(),
                current_period_start: remote.period_start,
                current_period_end: remote.period_end,
                metadata: json!({
                    "plan_ref": plan_ref,
                    "provider_plan_ref": remote.plan_ref,
                    "payer_id": remote.payer_id,
                }),
            })
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            subscription_id = %stored.provider_subscription_id,
            plan_name = %stored.plan_name,
            "Reconciled subscription"
        );

        Ok(ReconciledSubscription {
            id: stored.provider_subscription_id.clone(),
            status: stored.status.clone(),
            plan_name: stored.plan_name.clone(),
            subscription: stored,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use reviewloop_shared::ProviderKind;
    use time::macros::datetime;

    use super::*;
    use crate::provider::SimulatedProvider;
    use crate::store::MemorySubscriptionStore;

    fn active_provider() -> Arc<SimulatedProvider> {
        Arc::new(
            SimulatedProvider::new(ProviderKind::Paypal)
                .with_subscription("S1", "https://pay/approve/S1")
                .with_fetch_status("ACTIVE")
                .with_period(
                    datetime!(2024-01-01 0:00 UTC),
                    datetime!(2024-02-01 0:00 UTC),
                ),
        )
    }

    #[tokio::test]
    async fn test_reconcile_stores_normalized_and_raw_status() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let service = ApprovalService::new(active_provider(), store.clone());

        let result = service.reconcile("S1", "u1", "starter").await.unwrap();
        assert_eq!(result.id, "S1");
        assert_eq!(result.status, "active");
        assert_eq!(result.plan_name, "Starter");

        let row = store.get("u1").await.unwrap().unwrap();
        assert_eq!(row.status, "active");
        assert_eq!(row.raw_status, "active");
        assert_eq!(row.plan_name, "Starter");
        assert!(row.current_period_start.is_some());
        assert!(row.current_period_end.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let service = ApprovalService::new(active_provider(), store.clone());

        let first = service.reconcile("S1", "u1", "starter").await.unwrap();
        let second = service.reconcile("S1", "u1", "starter").await.unwrap();

        assert_eq!(store.len(), 1);
        let a = &first.subscription;
        let b = &second.subscription;
        assert_eq!(a.id, b.id);
        assert_eq!(a.provider_subscription_id, b.provider_subscription_id);
        assert_eq!(a.plan_name, b.plan_name);
        assert_eq!(a.status, b.status);
        assert_eq!(a.current_period_start, b.current_period_start);
        assert_eq!(a.current_period_end, b.current_period_end);
    }

    #[tokio::test]
    async fn test_non_active_subscription_is_rejected_without_upsert() {
        let provider = Arc::new(
            SimulatedProvider::new(ProviderKind::Paypal).with_fetch_status("PENDING"),
        );
        let store = Arc::new(MemorySubscriptionStore::new());
        let service = ApprovalService::new(provider.clone(), store.clone());

        let err = service.reconcile("S1", "u1", "starter").await.unwrap_err();
        assert!(matches!(err, BillingError::SubscriptionNotActive(_)));
        assert!(err.to_string().contains("PENDING"));
        assert!(store.is_empty());
        assert_eq!(provider.calls.fetch.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_switch_overwrites_record() {
        let store = Arc::new(MemorySubscriptionStore::new());

        let stripe = Arc::new(
            SimulatedProvider::new(ProviderKind::Stripe)
                .with_subscription("sub_1", "https://checkout/s1")
                .with_fetch_status("active"),
        );
        ApprovalService::new(stripe, store.clone())
            .reconcile("sub_1", "u1", "starter")
            .await
            .unwrap();

        let paypal = Arc::new(
            SimulatedProvider::new(ProviderKind::Paypal)
                .with_subscription("I-2", "https://pay/approve/I-2")
                .with_fetch_status("ACTIVE"),
        );
        ApprovalService::new(paypal, store.clone())
            .reconcile("I-2", "u1", "professional")
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let row = store.get("u1").await.unwrap().unwrap();
        assert_eq!(row.provider, "paypal");
        assert_eq!(row.provider_subscription_id, "I-2");
        assert_eq!(row.plan_name, "Professional");
    }

    #[tokio::test]
    async fn test_unknown_plan_falls_back_to_raw_ref() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let service = ApprovalService::new(active_provider(), store);

        let result = service.reconcile("S1", "u1", "P-CUSTOM-9").await.unwrap();
        assert_eq!(result.plan_name, "P-CUSTOM-9");
    }

    #[tokio::test]
    async fn test_trialing_stripe_subscription_counts_as_active() {
        let provider = Arc::new(
            SimulatedProvider::new(ProviderKind::Stripe)
                .with_subscription("sub_t", "https://checkout/t")
                .with_fetch_status("trialing"),
        );
        let store = Arc::new(MemorySubscriptionStore::new());
        let service = ApprovalService::new(provider, store.clone());

        let result = service.reconcile("sub_t", "u1", "starter").await.unwrap();
        assert_eq!(result.status, "active");
        assert_eq!(store.get("u1").await.unwrap().unwrap().raw_status, "trialing");
    }
}
