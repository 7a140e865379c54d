//! Subscription checkout
//!
//! Translates a catalog plan into the configured provider's reference and
//! starts the hosted approval flow. No state is persisted here: the record
//! only exists once the approval handler reconciles it.

use crate::config::BillingConfig;
use crate::error::BillingResult;
use crate::provider::{CreatedSubscription, ProviderHandle};

/// Parameters for starting a subscription
#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub plan_ref: String,
    pub tenant_id: String,
    pub tenant_email: String,
    pub return_url: String,
    pub cancel_url: String,
}

pub struct CheckoutService {
    provider: ProviderHandle,
    config: BillingConfig,
}

impl CheckoutService {
    pub fn new(provider: ProviderHandle, config: BillingConfig) -> Self {
        Self { provider, config }
    }

    /// Start a subscription; returns the approval URL the payer must visit.
    pub async fn create(&self, params: CheckoutParams) -> BillingResult<CreatedSubscription> {
        // Catalog plans resolve to the provider's price/plan id; anything
        // else is passed through verbatim so callers may hand over a
        // provider-native reference directly.
        let provider_ref = self
            .config
            .provider_plan_ref(self.provider.kind(), &params.plan_ref)
            .unwrap_or(&params.plan_ref)
            .to_string();

        let created = self
            .provider
            .create_subscription(
                &provider_ref,
                &params.tenant_id,
                &params.tenant_email,
                &params.return_url,
                &params.cancel_url,
            )
            .await?;

        tracing::info!(
            tenant_id = %params.tenant_id,
            provider = %self.provider.kind(),
            plan_ref = %params.plan_ref,
            subscription_id = %created.provider_subscription_id,
            "Created subscription checkout"
        );

        Ok(created)
    }
}
