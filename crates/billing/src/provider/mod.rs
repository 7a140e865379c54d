//! Payment provider abstraction
//!
//! One abstract capability set, two real implementations with divergent
//! capabilities (Stripe has a first-class billing portal, PayPal does not)
//! plus a deterministic in-process double. Divergence is signalled, never
//! papered over: a portal session that degrades to a static account page
//! carries `degraded: true`.

pub mod paypal;
pub mod simulated;
pub mod stripe;

use std::sync::Arc;

use async_trait::async_trait;
use reviewloop_shared::ProviderKind;
use time::OffsetDateTime;

use crate::config::{BillingConfig, ProviderSelection};
use crate::error::BillingResult;

pub use paypal::PaypalProvider;
pub use simulated::SimulatedProvider;
pub use stripe::StripeProvider;

/// Result of creating a subscription with a provider
#[derive(Debug, Clone)]
pub struct CreatedSubscription {
    /// Opaque id issued by the provider (checkout session or subscription id)
    pub provider_subscription_id: String,
    /// Hosted page the payer must visit to approve the subscription
    pub approval_url: String,
    /// Provider-reported status, verbatim
    pub raw_status: String,
}

/// Authoritative subscription state fetched from a provider
#[derive(Debug, Clone)]
pub struct ProviderSubscription {
    /// Canonical provider subscription id
    pub id: String,
    /// Provider-reported status, verbatim
    pub raw_status: String,
    pub period_start: Option<OffsetDateTime>,
    pub period_end: Option<OffsetDateTime>,
    /// Provider-side plan/price reference, if reported
    pub plan_ref: Option<String>,
    /// Provider-side payer/customer reference, if reported
    pub payer_id: Option<String>,
}

/// A provider-hosted management page
#[derive(Debug, Clone)]
pub struct PortalSession {
    pub url: String,
    /// True when the provider has no native portal primitive and the URL is
    /// a static account-management page instead of a scoped session
    pub degraded: bool,
}

/// Abstract contract every payment provider satisfies.
///
/// Each concrete provider translates these operations into its own REST
/// calls and normalizes the results into the shapes above.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// Which provider this client talks to
    fn kind(&self) -> ProviderKind;

    /// Start a subscription for a tenant; the payer completes it on the
    /// returned approval URL.
    async fn create_subscription(
        &self,
        plan_ref: &str,
        tenant_id: &str,
        tenant_email: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> BillingResult<CreatedSubscription>;

    /// Fetch authoritative subscription state.
    async fn fetch_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> BillingResult<ProviderSubscription>;

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()>;

    async fn suspend_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()>;

    async fn activate_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()>;

    /// Open a management/cancellation page for the payer.
    async fn create_portal_session(
        &self,
        reference: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession>;
}

/// Shared handle to the configured provider
pub type ProviderHandle = Arc<dyn SubscriptionProvider>;

/// Build the provider selected by configuration.
///
/// The reqwest client is built by the caller so the 30-second outbound
/// timeout is applied uniformly.
pub fn build_provider(
    config: &BillingConfig,
    http: reqwest::Client,
) -> BillingResult<ProviderHandle> {
    match config.provider {
        ProviderSelection::Stripe => {
            Ok(Arc::new(StripeProvider::from_config(config, http)?))
        }
        ProviderSelection::Paypal => {
            Ok(Arc::new(PaypalProvider::from_config(config, http)?))
        }
        ProviderSelection::Simulated => {
            Ok(Arc::new(SimulatedProvider::new(ProviderKind::Paypal)))
        }
    }
}
