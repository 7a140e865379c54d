//! Handler-level tests over the full router: the simulated provider and the
//! in-memory store stand in for the network and the database, so these cover
//! validation, response shapes, CORS, and the reconciliation flow without
//! external services.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use reviewloop_api::{AppState, Config};
use reviewloop_billing::{
    ApprovalService, BillingConfig, CheckoutService, ManageService, MemorySubscriptionStore,
    ProviderEnvironment, ProviderSelection, SimulatedProvider, SubscriptionStore,
};
use reviewloop_api::identity::IdentityAdmin;
use reviewloop_shared::ProviderKind;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use time::macros::datetime;
use tower::ServiceExt;

fn billing_config() -> BillingConfig {
    BillingConfig {
        provider: ProviderSelection::Simulated,
        environment: ProviderEnvironment::Sandbox,
        stripe: None,
        paypal: None,
        stripe_prices: Default::default(),
        paypal_plans: Default::default(),
        app_base_url: "http://localhost:3000".to_string(),
    }
}

fn test_router(
    provider: Arc<SimulatedProvider>,
    store: Arc<MemorySubscriptionStore>,
    identity_url: &str,
) -> Router {
    // Lazy pool: handlers that never touch Postgres never connect. The one
    // place that does (business deletion) treats the failure as best-effort.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://127.0.0.1:1/reviewloop_test")
        .unwrap();
    let config = Config {
        bind_address: "127.0.0.1:0".to_string(),
        public_url: "http://localhost:3000".to_string(),
        database_url: "postgres://127.0.0.1:1/reviewloop_test".to_string(),
        supabase_url: identity_url.to_string(),
        supabase_service_role_key: "service-key".to_string(),
        billing: billing_config(),
    };
    let dyn_store: Arc<dyn SubscriptionStore> = store;
    let state = AppState {
        pool,
        config: Arc::new(config),
        store: dyn_store.clone(),
        checkout: Arc::new(CheckoutService::new(provider.clone(), billing_config())),
        manage: Arc::new(ManageService::new(provider.clone(), dyn_store.clone())),
        approval: Arc::new(ApprovalService::new(provider, dyn_store)),
        identity: Arc::new(IdentityAdmin::new(
            identity_url.to_string(),
            "service-key".to_string(),
            reqwest::Client::new(),
        )),
    };
    reviewloop_api::routes::create_router(state)
}

fn default_router() -> (Arc<SimulatedProvider>, Arc<MemorySubscriptionStore>, Router) {
    let provider = Arc::new(
        SimulatedProvider::new(ProviderKind::Paypal)
            .with_subscription("S1", "https://pay/approve/S1")
            .with_create_status("CREATED")
            .with_period(
                datetime!(2024-01-01 0:00 UTC),
                datetime!(2024-02-01 0:00 UTC),
            ),
    );
    let store = Arc::new(MemorySubscriptionStore::new());
    let router = test_router(provider.clone(), store.clone(), "");
    (provider, store, router)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("origin", "https://some-embedding-site.example")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// create-subscription
// =============================================================================

#[tokio::test]
async fn create_subscription_happy_path_matches_contract() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/subscriptions",
            json!({
                "planRef": "starter",
                "tenantId": "u1",
                "tenantEmail": "a@b.com",
                "returnUrl": "https://x/ok",
                "cancelUrl": "https://x/no"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["approvalUrl"], "https://pay/approve/S1");
    assert_eq!(body["providerSubscriptionId"], "S1");
    assert_eq!(body["status"], "CREATED");
}

#[tokio::test]
async fn create_subscription_missing_field_is_400_with_no_provider_call() {
    let (provider, _, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/subscriptions",
            json!({
                "planRef": "starter",
                "tenantId": "u1",
                // tenantEmail absent
                "returnUrl": "https://x/ok",
                "cancelUrl": "https://x/no"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert_eq!(provider.calls.total(), 0);
}

#[tokio::test]
async fn create_subscription_empty_field_is_400() {
    let (provider, _, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/subscriptions",
            json!({
                "planRef": "",
                "tenantId": "u1",
                "tenantEmail": "a@b.com",
                "returnUrl": "https://x/ok",
                "cancelUrl": "https://x/no"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls.total(), 0);
}

#[tokio::test]
async fn create_subscription_wrong_method_is_405() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/billing/subscriptions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// approval-callback
// =============================================================================

#[tokio::test]
async fn approval_callback_reconciles_and_reports_normalized_state() {
    let (_, store, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/approval",
            json!({
                "providerSubscriptionId": "S1",
                "tenantId": "u1",
                "planRef": "starter"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["subscription"]["id"], "S1");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscription"]["plan_name"], "Starter");

    let row = store.get("u1").await.unwrap().unwrap();
    assert_eq!(row.status, "active");
    assert_eq!(row.plan_name, "Starter");
}

#[tokio::test]
async fn approval_callback_is_idempotent() {
    let (_, store, router) = default_router();

    let request = || {
        post_json(
            "/api/v1/billing/approval",
            json!({
                "providerSubscriptionId": "S1",
                "tenantId": "u1",
                "planRef": "starter"
            }),
        )
    };

    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn approval_callback_rejects_non_active_subscription() {
    let provider = Arc::new(
        SimulatedProvider::new(ProviderKind::Paypal).with_fetch_status("PENDING"),
    );
    let store = Arc::new(MemorySubscriptionStore::new());
    let router = test_router(provider.clone(), store.clone(), "");

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/approval",
            json!({
                "providerSubscriptionId": "S1",
                "tenantId": "u1",
                "planRef": "starter"
            }),
        ))
        .await
        .unwrap();

    // Business rejection rides the same 500 as transport failures; the code
    // field is what tells callers apart.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "SUBSCRIPTION_NOT_ACTIVE");
    assert!(body["error"].as_str().unwrap().contains("PENDING"));
    assert!(store.is_empty());
    assert_eq!(provider.calls.fetch.load(Ordering::SeqCst), 1);
}

// =============================================================================
// manage-subscription
// =============================================================================

#[tokio::test]
async fn manage_portal_reports_degradation() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/manage",
            json!({
                "subscriptionRef": "S1",
                "returnUrl": "https://x/billing"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(!body["url"].as_str().unwrap().is_empty());
    assert_eq!(body["degraded"], true);
}

#[tokio::test]
async fn manage_cancel_transitions_stored_status() {
    let (_, store, router) = default_router();

    // Approve first so a row exists
    router
        .clone()
        .oneshot(post_json(
            "/api/v1/billing/approval",
            json!({
                "providerSubscriptionId": "S1",
                "tenantId": "u1",
                "planRef": "starter"
            }),
        ))
        .await
        .unwrap();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/manage",
            json!({
                "subscriptionRef": "S1",
                "returnUrl": "https://x/billing",
                "action": "cancel"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Subscription cancelled successfully");
    assert_eq!(body["redirectUrl"], "https://x/billing");

    let row = store.get("u1").await.unwrap().unwrap();
    assert_eq!(row.status, "cancelled");
    assert!(row.cancelled_at.is_some());
}

#[tokio::test]
async fn manage_unknown_action_is_400() {
    let (provider, _, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/manage",
            json!({
                "subscriptionRef": "S1",
                "returnUrl": "https://x/billing",
                "action": "refund"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls.total(), 0);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn get_subscription_for_unsubscribed_tenant_is_null_not_error() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/billing/subscription?tenantId=u-never")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["subscription"].is_null());
}

#[tokio::test]
async fn plans_endpoint_lists_catalog() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/billing/plans")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let plans = body.as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["id"], "starter");
    assert_eq!(plans[1]["popular"], true);
}

#[tokio::test]
async fn diagnostics_reports_presence_without_secrets() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/billing/diagnostics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "simulated");
    assert_eq!(body["has_stripe_credentials"], false);
    assert_eq!(body["has_paypal_credentials"], false);
}

// =============================================================================
// delete-account
// =============================================================================

#[tokio::test]
async fn delete_account_removes_subscription_and_identity_user() {
    let mut identity_server = mockito::Server::new_async().await;
    let identity_mock = identity_server
        .mock("DELETE", "/auth/v1/admin/users/u1")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let provider = Arc::new(SimulatedProvider::new(ProviderKind::Paypal));
    let store = Arc::new(MemorySubscriptionStore::new());
    let router = test_router(provider, store.clone(), &identity_server.url());

    // Seed a subscription through the approval flow
    router
        .clone()
        .oneshot(post_json(
            "/api/v1/billing/approval",
            json!({
                "providerSubscriptionId": "SIM-1001",
                "tenantId": "u1",
                "planRef": "starter"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(store.len(), 1);

    let response = router
        .oneshot(post_json(
            "/api/v1/account/delete",
            json!({"tenantId": "u1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(store.is_empty());
    identity_mock.assert_async().await;
}

#[tokio::test]
async fn delete_account_fails_when_identity_deletion_fails() {
    let mut identity_server = mockito::Server::new_async().await;
    identity_server
        .mock("DELETE", "/auth/v1/admin/users/u1")
        .with_status(500)
        .with_body(r#"{"msg":"boom"}"#)
        .create_async()
        .await;

    let provider = Arc::new(SimulatedProvider::new(ProviderKind::Paypal));
    let store = Arc::new(MemorySubscriptionStore::new());
    let router = test_router(provider, store, &identity_server.url());

    let response = router
        .oneshot(post_json(
            "/api/v1/account/delete",
            json!({"tenantId": "u1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn delete_account_requires_tenant_id() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(post_json("/api/v1/account/delete", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn responses_carry_wildcard_cors() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/billing/approval",
            json!({
                "providerSubscriptionId": "S1",
                "tenantId": "u1",
                "planRef": "starter"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn options_preflight_returns_200() {
    let (_, _, router) = default_router();

    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/billing/subscriptions")
                .header("origin", "https://some-embedding-site.example")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
