//! Simulated provider
//!
//! In-process stand-in implementing the full provider contract with
//! deterministic responses. Selected via configuration for local development
//! and used directly in tests, where its per-operation call counters back
//! "no outbound call was made" assertions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reviewloop_shared::ProviderKind;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::provider::{
    CreatedSubscription, PortalSession, ProviderSubscription, SubscriptionProvider,
};

/// Per-operation invocation counters
#[derive(Debug, Default)]
pub struct CallCounts {
    pub create: AtomicUsize,
    pub fetch: AtomicUsize,
    pub cancel: AtomicUsize,
    pub suspend: AtomicUsize,
    pub activate: AtomicUsize,
    pub portal: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.create.load(Ordering::SeqCst)
            + self.fetch.load(Ordering::SeqCst)
            + self.cancel.load(Ordering::SeqCst)
            + self.suspend.load(Ordering::SeqCst)
            + self.activate.load(Ordering::SeqCst)
            + self.portal.load(Ordering::SeqCst)
    }
}

pub struct SimulatedProvider {
    kind: ProviderKind,
    subscription_id: String,
    approval_url: String,
    create_status: String,
    fetch_status: Mutex<String>,
    period_start: Option<OffsetDateTime>,
    period_end: Option<OffsetDateTime>,
    plan_ref: Option<String>,
    pub calls: CallCounts,
}

impl SimulatedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            subscription_id: "SIM-1001".to_string(),
            approval_url: "https://payments.example/approve/SIM-1001".to_string(),
            create_status: "APPROVAL_PENDING".to_string(),
            fetch_status: Mutex::new("ACTIVE".to_string()),
            period_start: None,
            period_end: None,
            plan_ref: None,
            calls: CallCounts::default(),
        }
    }

    pub fn with_subscription(mut self, id: &str, approval_url: &str) -> Self {
        self.subscription_id = id.to_string();
        self.approval_url = approval_url.to_string();
        self
    }

    pub fn with_create_status(mut self, raw_status: &str) -> Self {
        self.create_status = raw_status.to_string();
        self
    }

    pub fn with_fetch_status(self, raw_status: &str) -> Self {
        self.set_fetch_status(raw_status);
        self
    }

    pub fn with_period(mut self, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        self.period_start = Some(start);
        self.period_end = Some(end);
        self
    }

    pub fn with_plan_ref(mut self, plan_ref: &str) -> Self {
        self.plan_ref = Some(plan_ref.to_string());
        self
    }

    /// Change what subsequent fetches report, e.g. to walk a subscription
    /// through its lifecycle mid-test.
    pub fn set_fetch_status(&self, raw_status: &str) {
        if let Ok(mut status) = self.fetch_status.lock() {
            *status = raw_status.to_string();
        }
    }
}

#[async_trait]
impl SubscriptionProvider for SimulatedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn create_subscription(
        &self,
        _plan_ref: &str,
        tenant_id: &str,
        _tenant_email: &str,
        _return_url: &str,
        _cancel_url: &str,
    ) -> BillingResult<CreatedSubscription> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(tenant_id = %tenant_id, "Simulated subscription created");
        Ok(CreatedSubscription {
            provider_subscription_id: self.subscription_id.clone(),
            approval_url: self.approval_url.clone(),
            raw_status: self.create_status.clone(),
        })
    }

    async fn fetch_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> BillingResult<ProviderSubscription> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        let raw_status = self
            .fetch_status
            .lock()
            .map_err(|_| BillingError::ProviderResponse("simulated state poisoned".to_string()))?
            .clone();
        Ok(ProviderSubscription {
            id: provider_subscription_id.to_string(),
            raw_status,
            period_start: self.period_start,
            period_end: self.period_end,
            plan_ref: self.plan_ref.clone(),
            payer_id: Some("SIM-PAYER".to_string()),
        })
    }

    async fn cancel_subscription(&self, _id: &str, _reason: &str) -> BillingResult<()> {
        self.calls.cancel.fetch_add(1, Ordering::SeqCst);
        self.set_fetch_status("CANCELLED");
        Ok(())
    }

    async fn suspend_subscription(&self, _id: &str, _reason: &str) -> BillingResult<()> {
        self.calls.suspend.fetch_add(1, Ordering::SeqCst);
        self.set_fetch_status("SUSPENDED");
        Ok(())
    }

    async fn activate_subscription(&self, _id: &str, _reason: &str) -> BillingResult<()> {
        self.calls.activate.fetch_add(1, Ordering::SeqCst);
        self.set_fetch_status("ACTIVE");
        Ok(())
    }

    async fn create_portal_session(
        &self,
        _reference: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession> {
        self.calls.portal.fetch_add(1, Ordering::SeqCst);
        match self.kind {
            ProviderKind::Stripe => Ok(PortalSession {
                url: format!("https://billing.example/portal?return={}", return_url),
                degraded: false,
            }),
            ProviderKind::Paypal => Ok(PortalSession {
                url: "https://payments.example/myaccount/autopay/".to_string(),
                degraded: true,
            }),
        }
    }
}
