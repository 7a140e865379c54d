//! Subscription management
//!
//! Portal sessions and the cancel/suspend/activate transitions. Provider
//! errors propagate to the caller unchanged; a successful provider call is
//! followed by the matching status transition in the store. The store write
//! targets the tenant row when the caller supplied one, otherwise the row is
//! located by its provider reference.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::BillingResult;
use crate::provider::{PortalSession, ProviderHandle};
use crate::store::{StatusChange, SubscriptionStore};

const DEFAULT_CANCEL_REASON: &str = "User requested cancellation";
const DEFAULT_SUSPEND_REASON: &str = "User requested suspension";
const DEFAULT_ACTIVATE_REASON: &str = "User requested reactivation";

/// Management actions a payer can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManageAction {
    Cancel,
    Suspend,
    Activate,
    /// Open the provider-hosted management page
    Portal,
}

impl ManageAction {
    /// Empty or missing action means portal, matching the request contract.
    pub fn parse(action: Option<&str>) -> Result<Self, String> {
        match action.unwrap_or("") {
            "" | "manage" | "portal" => Ok(Self::Portal),
            "cancel" => Ok(Self::Cancel),
            "suspend" => Ok(Self::Suspend),
            "activate" => Ok(Self::Activate),
            other => Err(format!("Unknown action: {}", other)),
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Cancel => "Subscription cancelled successfully",
            Self::Suspend => "Subscription suspended successfully",
            Self::Activate => "Subscription activated successfully",
            Self::Portal => "Portal session created",
        }
    }
}

pub struct ManageService {
    provider: ProviderHandle,
    store: Arc<dyn SubscriptionStore>,
}

impl ManageService {
    pub fn new(provider: ProviderHandle, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { provider, store }
    }

    pub async fn portal(
        &self,
        subscription_ref: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession> {
        let session = self
            .provider
            .create_portal_session(subscription_ref, return_url)
            .await?;
        if session.degraded {
            tracing::info!(
                provider = %self.provider.kind(),
                "Provider has no native portal; returning static management URL"
            );
        }
        Ok(session)
    }

    pub async fn transition(
        &self,
        action: ManageAction,
        subscription_ref: &str,
        tenant_id: Option<&str>,
    ) -> BillingResult<()> {
        match action {
            ManageAction::Cancel => {
                self.provider
                    .cancel_subscription(subscription_ref, DEFAULT_CANCEL_REASON)
                    .await?;
                self.record(
                    subscription_ref,
                    tenant_id,
                    StatusChange::cancelled(OffsetDateTime::now_utc()),
                )
                .await
            }
            ManageAction::Suspend => {
                self.provider
                    .suspend_subscription(subscription_ref, DEFAULT_SUSPEND_REASON)
                    .await?;
                self.record(subscription_ref, tenant_id, StatusChange::suspended())
                    .await
            }
            ManageAction::Activate => {
                self.provider
                    .activate_subscription(subscription_ref, DEFAULT_ACTIVATE_REASON)
                    .await?;
                self.record(subscription_ref, tenant_id, StatusChange::activated())
                    .await
            }
            ManageAction::Portal => Ok(()),
        }
    }

    /// Write the status transition; a missing local row is logged, not an
    /// error, since the provider is the source of truth and the next
    /// reconciliation will catch up.
    async fn record(
        &self,
        subscription_ref: &str,
        tenant_id: Option<&str>,
        change: StatusChange,
    ) -> BillingResult<()> {
        let provider = self.provider.kind();

        let tenant = match tenant_id {
            Some(t) => Some(t.to_string()),
            None => self
                .store
                .find_by_provider_ref(provider, subscription_ref)
                .await?
                .map(|s| s.tenant_id),
        };

        match tenant {
            Some(tenant) => {
                let updated = self.store.update_status(&tenant, provider, change).await?;
                if updated.is_none() {
                    tracing::warn!(
                        tenant_id = %tenant,
                        provider = %provider,
                        "No subscription row matched status transition"
                    );
                }
            }
            None => {
                tracing::warn!(
                    provider = %provider,
                    subscription_ref = %subscription_ref,
                    "No tenant found for subscription reference; skipping status write"
                );
            }
        }
        Ok(())
    }
}
