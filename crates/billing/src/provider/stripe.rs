//! Stripe provider client
//!
//! Lightweight wrapper around Stripe's REST API over raw HTTP. Checkout
//! sessions carry the subscription intent; the approval URL is the hosted
//! checkout page. Suspend/activate map onto `pause_collection`.

use async_trait::async_trait;
use reviewloop_shared::ProviderKind;
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::provider::{
    CreatedSubscription, PortalSession, ProviderSubscription, SubscriptionProvider,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Clone)]
pub struct StripeProvider {
    secret_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: String, base_url: String, client: reqwest::Client) -> Self {
        Self {
            secret_key,
            base_url,
            client,
        }
    }

    pub fn from_config(config: &BillingConfig, client: reqwest::Client) -> BillingResult<Self> {
        let creds = config
            .stripe
            .as_ref()
            .ok_or_else(|| BillingError::ProviderAuth("STRIPE_SECRET_KEY not set".to_string()))?;
        Ok(Self::new(
            creds.secret_key.clone(),
            STRIPE_API_BASE.to_string(),
            client,
        ))
    }

    async fn post(&self, path: &str, params: &[(&str, &str)]) -> BillingResult<Value> {
        let url = format!("{}/v1{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| BillingError::ProviderRequest(format!("Stripe request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn get(&self, path: &str) -> BillingResult<Value> {
        let url = format!("{}/v1{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| BillingError::ProviderRequest(format!("Stripe request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn delete(&self, path: &str, params: &[(&str, &str)]) -> BillingResult<Value> {
        let url = format!("{}/v1{}", self.base_url, path);
        let resp = self
            .client
            .delete(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| BillingError::ProviderRequest(format!("Stripe request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn parse_response(resp: reqwest::Response) -> BillingResult<Value> {
        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| {
            BillingError::ProviderResponse(format!("Stripe response parse failed: {}", e))
        })?;

        if !status.is_success() {
            let msg = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown Stripe error");
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(BillingError::ProviderAuth(format!("Stripe error: {}", msg)));
            }
            return Err(BillingError::ProviderRequest(format!(
                "Stripe error: {} - {}",
                status.as_u16(),
                msg
            )));
        }
        Ok(body)
    }

    fn epoch_field(value: &Value, key: &str) -> Option<OffsetDateTime> {
        value[key]
            .as_i64()
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
    }
}

#[async_trait]
impl SubscriptionProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn create_subscription(
        &self,
        plan_ref: &str,
        tenant_id: &str,
        tenant_email: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> BillingResult<CreatedSubscription> {
        let session = self
            .post(
                "/checkout/sessions",
                &[
                    ("mode", "subscription"),
                    ("line_items[0][price]", plan_ref),
                    ("line_items[0][quantity]", "1"),
                    ("customer_email", tenant_email),
                    ("success_url", return_url),
                    ("cancel_url", cancel_url),
                    ("metadata[tenant_id]", tenant_id),
                ],
            )
            .await?;

        let approval_url = session["url"]
            .as_str()
            .ok_or_else(|| {
                BillingError::ProviderResponse(
                    "No checkout URL found in Stripe response".to_string(),
                )
            })?
            .to_string();

        // The subscription id only exists once checkout completes; until then
        // the session id is the reference the caller holds.
        let provider_subscription_id = session["subscription"]
            .as_str()
            .or_else(|| session["id"].as_str())
            .ok_or_else(|| {
                BillingError::ProviderResponse(
                    "No session id found in Stripe response".to_string(),
                )
            })?
            .to_string();

        let raw_status = session["status"].as_str().unwrap_or("open").to_string();

        tracing::info!(
            tenant_id = %tenant_id,
            session_id = %provider_subscription_id,
            plan_ref = %plan_ref,
            "Created Stripe checkout session"
        );

        Ok(CreatedSubscription {
            provider_subscription_id,
            approval_url,
            raw_status,
        })
    }

    async fn fetch_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> BillingResult<ProviderSubscription> {
        // Callers returning from checkout hold a session id; resolve it to
        // the underlying subscription first.
        let subscription_id = if provider_subscription_id.starts_with("cs_") {
            let session = self
                .get(&format!("/checkout/sessions/{}", provider_subscription_id))
                .await?;
            session["subscription"]
                .as_str()
                .ok_or_else(|| {
                    BillingError::ProviderResponse(
                        "Checkout session has no subscription attached".to_string(),
                    )
                })?
                .to_string()
        } else {
            provider_subscription_id.to_string()
        };

        let sub = self
            .get(&format!("/subscriptions/{}", subscription_id))
            .await?;

        let id = sub["id"]
            .as_str()
            .ok_or_else(|| {
                BillingError::ProviderResponse(
                    "No subscription id found in Stripe response".to_string(),
                )
            })?
            .to_string();
        let raw_status = sub["status"].as_str().unwrap_or("unknown").to_string();

        Ok(ProviderSubscription {
            id,
            raw_status,
            period_start: Self::epoch_field(&sub, "current_period_start"),
            period_end: Self::epoch_field(&sub, "current_period_end"),
            plan_ref: sub["items"]["data"][0]["price"]["id"]
                .as_str()
                .map(str::to_string),
            payer_id: sub["customer"].as_str().map(str::to_string),
        })
    }

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()> {
        self.delete(
            &format!("/subscriptions/{}", provider_subscription_id),
            &[("cancellation_details[comment]", reason)],
        )
        .await?;
        tracing::info!(
            subscription_id = %provider_subscription_id,
            "Cancelled Stripe subscription"
        );
        Ok(())
    }

    async fn suspend_subscription(
        &self,
        provider_subscription_id: &str,
        _reason: &str,
    ) -> BillingResult<()> {
        self.post(
            &format!("/subscriptions/{}", provider_subscription_id),
            &[("pause_collection[behavior]", "void")],
        )
        .await?;
        tracing::info!(
            subscription_id = %provider_subscription_id,
            "Paused Stripe subscription collection"
        );
        Ok(())
    }

    async fn activate_subscription(
        &self,
        provider_subscription_id: &str,
        _reason: &str,
    ) -> BillingResult<()> {
        // Empty value clears pause_collection and resumes billing
        self.post(
            &format!("/subscriptions/{}", provider_subscription_id),
            &[("pause_collection", "")],
        )
        .await?;
        tracing::info!(
            subscription_id = %provider_subscription_id,
            "Resumed Stripe subscription collection"
        );
        Ok(())
    }

    async fn create_portal_session(
        &self,
        reference: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession> {
        let session = self
            .post(
                "/billing_portal/sessions",
                &[("customer", reference), ("return_url", return_url)],
            )
            .await?;

        let url = session["url"]
            .as_str()
            .ok_or_else(|| {
                BillingError::ProviderResponse(
                    "No portal URL found in Stripe response".to_string(),
                )
            })?
            .to_string();

        Ok(PortalSession {
            url,
            degraded: false,
        })
    }
}
