//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reviewloop_billing::{
    build_provider, ApprovalService, CheckoutService, ManageService, PgSubscriptionStore,
    SubscriptionStore,
};
use sqlx::PgPool;

use crate::config::Config;
use crate::identity::IdentityAdmin;

/// Outbound calls are abandoned after this long; there is no retry.
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub store: Arc<dyn SubscriptionStore>,
    pub checkout: Arc<CheckoutService>,
    pub manage: Arc<ManageService>,
    pub approval: Arc<ApprovalService>,
    pub identity: Arc<IdentityAdmin>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let provider = build_provider(&config.billing, http.clone())
            .context("Failed to build payment provider")?;
        let store: Arc<dyn SubscriptionStore> = Arc::new(PgSubscriptionStore::new(pool.clone()));

        let checkout = Arc::new(CheckoutService::new(provider.clone(), config.billing.clone()));
        let manage = Arc::new(ManageService::new(provider.clone(), store.clone()));
        let approval = Arc::new(ApprovalService::new(provider, store.clone()));
        let identity = Arc::new(IdentityAdmin::new(
            config.supabase_url.clone(),
            config.supabase_service_role_key.clone(),
            http,
        ));

        Ok(Self {
            pool,
            config: Arc::new(config),
            store,
            checkout,
            manage,
            approval,
            identity,
        })
    }
}
