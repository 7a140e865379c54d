//! API routes

pub mod account;
pub mod billing;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// The write endpoints accept a single verb; anything else is 405.
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Handlers may be invoked from arbitrary embed contexts, so every
    // response carries wildcard-origin CORS headers and OPTIONS preflights
    // are answered by the layer.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/api/v1/billing/plans", get(billing::list_plans))
        .route("/api/v1/billing/subscription", get(billing::get_subscription))
        .route(
            "/api/v1/billing/subscriptions",
            post(billing::create_subscription).fallback(method_not_allowed),
        )
        .route(
            "/api/v1/billing/manage",
            post(billing::manage_subscription).fallback(method_not_allowed),
        )
        .route(
            "/api/v1/billing/approval",
            post(billing::approval_callback).fallback(method_not_allowed),
        )
        .route("/api/v1/billing/diagnostics", get(billing::diagnostics))
        .route(
            "/api/v1/account/delete",
            post(account::delete_account).fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
