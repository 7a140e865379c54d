//! Billing routes: checkout, manage, approval reconciliation, reads

use axum::{
    extract::{Query, State},
    Json,
};
use reviewloop_billing::{catalog, CheckoutParams, ManageAction};
use reviewloop_shared::Subscription;
use serde::{Deserialize, Serialize};

use crate::error::{require_fields, ApiError, ApiResult};
use crate::state::AppState;

// =============================================================================
// create-subscription
// =============================================================================

/// Request to start a subscription. Field names match what the embed widget
/// and dashboard send; absent fields deserialize empty and are rejected with
/// 400 before any provider call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    #[serde(default)]
    pub plan_ref: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_email: String,
    #[serde(default)]
    pub return_url: String,
    #[serde(default)]
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionResponse {
    pub approval_url: String,
    pub provider_subscription_id: String,
    /// Provider-reported status, verbatim
    pub status: String,
}

/// Start a subscription; responds with the provider's hosted approval URL.
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> ApiResult<Json<CreateSubscriptionResponse>> {
    require_fields(&[
        ("planRef", &req.plan_ref),
        ("tenantId", &req.tenant_id),
        ("tenantEmail", &req.tenant_email),
        ("returnUrl", &req.return_url),
        ("cancelUrl", &req.cancel_url),
    ])?;

    let created = state
        .checkout
        .create(CheckoutParams {
            plan_ref: req.plan_ref,
            tenant_id: req.tenant_id,
            tenant_email: req.tenant_email,
            return_url: req.return_url,
            cancel_url: req.cancel_url,
        })
        .await?;

    Ok(Json(CreateSubscriptionResponse {
        approval_url: created.approval_url,
        provider_subscription_id: created.provider_subscription_id,
        status: created.raw_status,
    }))
}

// =============================================================================
// manage-subscription
// =============================================================================

/// Portal/cancel/suspend/activate request. An empty or missing action opens
/// the management portal. `tenantId` is optional; without it the subscription
/// row is located by its provider reference.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageSubscriptionRequest {
    #[serde(default)]
    pub subscription_ref: String,
    #[serde(default)]
    pub return_url: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ManageSubscriptionResponse {
    Portal {
        url: String,
        degraded: bool,
    },
    #[serde(rename_all = "camelCase")]
    Action {
        success: bool,
        message: &'static str,
        redirect_url: String,
    },
}

pub async fn manage_subscription(
    State(state): State<AppState>,
    Json(req): Json<ManageSubscriptionRequest>,
) -> ApiResult<Json<ManageSubscriptionResponse>> {
    require_fields(&[
        ("subscriptionRef", &req.subscription_ref),
        ("returnUrl", &req.return_url),
    ])?;
    let action = ManageAction::parse(req.action.as_deref()).map_err(ApiError::Validation)?;

    match action {
        ManageAction::Portal => {
            let session = state
                .manage
                .portal(&req.subscription_ref, &req.return_url)
                .await?;
            Ok(Json(ManageSubscriptionResponse::Portal {
                url: session.url,
                degraded: session.degraded,
            }))
        }
        _ => {
            state
                .manage
                .transition(action, &req.subscription_ref, req.tenant_id.as_deref())
                .await?;
            Ok(Json(ManageSubscriptionResponse::Action {
                success: true,
                message: action.success_message(),
                redirect_url: req.return_url,
            }))
        }
    }
}

// =============================================================================
// approval-callback
// =============================================================================

/// Posted by the front end after the payer returns from the provider's
/// hosted approval page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalCallbackRequest {
    #[serde(default)]
    pub provider_subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub plan_ref: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalCallbackResponse {
    pub success: bool,
    pub subscription: ApprovedSubscription,
}

#[derive(Debug, Serialize)]
pub struct ApprovedSubscription {
    pub id: String,
    pub status: String,
    pub plan_name: String,
}

/// Reconcile authoritative provider state into the subscription store.
/// Safe to call twice with the same inputs; the second call re-fetches and
/// re-upserts the same record.
pub async fn approval_callback(
    State(state): State<AppState>,
    Json(req): Json<ApprovalCallbackRequest>,
) -> ApiResult<Json<ApprovalCallbackResponse>> {
    require_fields(&[
        ("providerSubscriptionId", &req.provider_subscription_id),
        ("tenantId", &req.tenant_id),
        ("planRef", &req.plan_ref),
    ])?;

    let reconciled = state
        .approval
        .reconcile(&req.provider_subscription_id, &req.tenant_id, &req.plan_ref)
        .await?;

    Ok(Json(ApprovalCallbackResponse {
        success: true,
        subscription: ApprovedSubscription {
            id: reconciled.id,
            status: reconciled.status,
            plan_name: reconciled.plan_name,
        },
    }))
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionQuery {
    #[serde(default)]
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// None is the steady state for a tenant who never subscribed
    pub subscription: Option<Subscription>,
}

/// Current subscription for a tenant; the UI gates feature access on this.
pub async fn get_subscription(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> ApiResult<Json<SubscriptionResponse>> {
    require_fields(&[("tenantId", &query.tenant_id)])?;
    let subscription = state.store.get(&query.tenant_id).await?;
    Ok(Json(SubscriptionResponse { subscription }))
}

/// Static plan catalog
pub async fn list_plans() -> Json<&'static [catalog::Plan]> {
    Json(catalog::PLANS)
}

// =============================================================================
// Diagnostics
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub provider: String,
    pub environment: String,
    pub has_stripe_credentials: bool,
    pub has_paypal_credentials: bool,
    pub stripe_key_prefix: Option<String>,
    pub paypal_client_id_prefix: Option<String>,
}

fn prefix(secret: &str) -> String {
    let head: String = secret.chars().take(8).collect();
    format!("{}...", head)
}

/// Sanitized configuration health: presence booleans and credential prefixes
/// only, never the secrets themselves.
pub async fn diagnostics(State(state): State<AppState>) -> Json<DiagnosticsResponse> {
    let billing = &state.config.billing;
    Json(DiagnosticsResponse {
        provider: format!("{:?}", billing.provider).to_lowercase(),
        environment: format!("{:?}", billing.environment).to_lowercase(),
        has_stripe_credentials: billing.stripe.is_some(),
        has_paypal_credentials: billing.paypal.is_some(),
        stripe_key_prefix: billing.stripe.as_ref().map(|c| prefix(&c.secret_key)),
        paypal_client_id_prefix: billing.paypal.as_ref().map(|c| prefix(&c.client_id)),
    })
}
