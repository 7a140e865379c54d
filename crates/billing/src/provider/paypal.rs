//! PayPal provider client
//!
//! Bearer-token REST client: every privileged call is preceded by a fresh
//! client-credentials token exchange. Operation volume is low enough that the
//! token is not cached.
//!
//! PayPal has no equivalent of Stripe's billing portal; the portal operation
//! degrades to the payer's static autopay management page and says so.

use async_trait::async_trait;
use reviewloop_shared::ProviderKind;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::{BillingConfig, ProviderEnvironment};
use crate::error::{BillingError, BillingResult};
use crate::provider::{
    CreatedSubscription, PortalSession, ProviderSubscription, SubscriptionProvider,
};

const PAYPAL_API_LIVE: &str = "https://api-m.paypal.com";
const PAYPAL_API_SANDBOX: &str = "https://api-m.sandbox.paypal.com";
const PAYPAL_WEB_LIVE: &str = "https://www.paypal.com";
const PAYPAL_WEB_SANDBOX: &str = "https://www.sandbox.paypal.com";

#[derive(Clone)]
pub struct PaypalProvider {
    client_id: String,
    client_secret: String,
    base_url: String,
    /// Payer-facing site, used for the degraded portal URL
    web_base_url: String,
    client: reqwest::Client,
}

impl PaypalProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        base_url: String,
        web_base_url: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            base_url,
            web_base_url,
            client,
        }
    }

    pub fn from_config(config: &BillingConfig, client: reqwest::Client) -> BillingResult<Self> {
        let creds = config.paypal.as_ref().ok_or_else(|| {
            BillingError::ProviderAuth("PAYPAL_CLIENT_ID / PAYPAL_CLIENT_SECRET not set".to_string())
        })?;
        let (base_url, web_base_url) = match config.environment {
            ProviderEnvironment::Live => (PAYPAL_API_LIVE, PAYPAL_WEB_LIVE),
            ProviderEnvironment::Sandbox => (PAYPAL_API_SANDBOX, PAYPAL_WEB_SANDBOX),
        };
        Ok(Self::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            base_url.to_string(),
            web_base_url.to_string(),
            client,
        ))
    }

    /// Client-credentials exchange; fetched fresh per logical operation.
    async fn access_token(&self) -> BillingResult<String> {
        let resp = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| BillingError::ProviderRequest(format!("PayPal request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(BillingError::ProviderAuth(format!(
                "Failed to get PayPal access token: {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await.map_err(|e| {
            BillingError::ProviderResponse(format!("PayPal token parse failed: {}", e))
        })?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                BillingError::ProviderResponse("No access token in PayPal response".to_string())
            })
    }

    async fn post(&self, path: &str, body: &Value) -> BillingResult<Value> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| BillingError::ProviderRequest(format!("PayPal request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn get(&self, path: &str) -> BillingResult<Value> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BillingError::ProviderRequest(format!("PayPal request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn parse_response(resp: reqwest::Response) -> BillingResult<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BillingError::ProviderRequest(format!(
                "PayPal API error: {} - {}",
                status.as_u16(),
                body
            )));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        // Some success responses (204 alternatives) come back empty-bodied
        let text = resp.text().await.unwrap_or_default();
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            BillingError::ProviderResponse(format!("PayPal response parse failed: {}", e))
        })
    }

    fn rfc3339_field(value: &Value) -> Option<OffsetDateTime> {
        value
            .as_str()
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
    }

    async fn transition(&self, id: &str, action: &str, reason: &str) -> BillingResult<()> {
        self.post(
            &format!("/v1/billing/subscriptions/{}/{}", id, action),
            &json!({ "reason": reason }),
        )
        .await?;
        tracing::info!(
            subscription_id = %id,
            action = %action,
            "PayPal subscription state transition"
        );
        Ok(())
    }
}

#[async_trait]
impl SubscriptionProvider for PaypalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paypal
    }

    async fn create_subscription(
        &self,
        plan_ref: &str,
        tenant_id: &str,
        tenant_email: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> BillingResult<CreatedSubscription> {
        let request = json!({
            "plan_id": plan_ref,
            "subscriber": { "email_address": tenant_email },
            "application_context": {
                "brand_name": "ReviewLoop",
                "locale": "en-US",
                "shipping_preference": "NO_SHIPPING",
                "user_action": "SUBSCRIBE_NOW",
                "payment_method": {
                    "payer_selected": "PAYPAL",
                    "payee_preferred": "IMMEDIATE_PAYMENT_REQUIRED"
                },
                "return_url": return_url,
                "cancel_url": cancel_url
            },
            "custom_id": tenant_id
        });

        let subscription = self.post("/v1/billing/subscriptions", &request).await?;

        let provider_subscription_id = subscription["id"]
            .as_str()
            .ok_or_else(|| {
                BillingError::ProviderResponse(
                    "No subscription id found in PayPal response".to_string(),
                )
            })?
            .to_string();

        let approval_url = subscription["links"]
            .as_array()
            .and_then(|links| {
                links
                    .iter()
                    .find(|link| link["rel"].as_str() == Some("approve"))
            })
            .and_then(|link| link["href"].as_str())
            .ok_or_else(|| {
                BillingError::ProviderResponse(
                    "No approval link found in PayPal response".to_string(),
                )
            })?
            .to_string();

        let raw_status = subscription["status"]
            .as_str()
            .unwrap_or("APPROVAL_PENDING")
            .to_string();

        tracing::info!(
            tenant_id = %tenant_id,
            subscription_id = %provider_subscription_id,
            plan_ref = %plan_ref,
            "Created PayPal subscription"
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
        let sub = self
            .get(&format!(
                "/v1/billing/subscriptions/{}",
                provider_subscription_id
            ))
            .await?;

        let id = sub["id"]
            .as_str()
            .unwrap_or(provider_subscription_id)
            .to_string();
        let raw_status = sub["status"].as_str().unwrap_or("UNKNOWN").to_string();

        Ok(ProviderSubscription {
            id,
            raw_status,
            period_start: Self::rfc3339_field(&sub["start_time"]),
            period_end: Self::rfc3339_field(&sub["billing_info"]["next_billing_time"]),
            plan_ref: sub["plan_id"].as_str().map(str::to_string),
            payer_id: sub["subscriber"]["payer_id"].as_str().map(str::to_string),
        })
    }

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()> {
        self.transition(provider_subscription_id, "cancel", reason)
            .await
    }

    async fn suspend_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()> {
        self.transition(provider_subscription_id, "suspend", reason)
            .await
    }

    async fn activate_subscription(
        &self,
        provider_subscription_id: &str,
        reason: &str,
    ) -> BillingResult<()> {
        self.transition(provider_subscription_id, "activate", reason)
            .await
    }

    async fn create_portal_session(
        &self,
        reference: &str,
        _return_url: &str,
    ) -> BillingResult<PortalSession> {
        // Validate the subscription exists before pointing the payer at the
        // static management page.
        self.get(&format!("/v1/billing/subscriptions/{}", reference))
            .await?;

        Ok(PortalSession {
            url: format!("{}/myaccount/autopay/", self.web_base_url),
            degraded: true,
        })
    }
}
