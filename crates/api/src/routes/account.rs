//! Privileged account deletion
//!
//! Runs with the service-role key: removes the tenant's businesses (reviews
//! cascade in the database), their subscription record, then the
//! identity-provider user. The data deletions are best-effort and logged;
//! only a failure to delete the identity user aborts the request.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{require_fields, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
}

pub async fn delete_account(
    State(state): State<AppState>,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<Json<DeleteAccountResponse>> {
    require_fields(&[("tenantId", &req.tenant_id)])?;

    if let Err(e) = sqlx::query("DELETE FROM businesses WHERE tenant_id = $1")
        .bind(&req.tenant_id)
        .execute(&state.pool)
        .await
    {
        tracing::error!(tenant_id = %req.tenant_id, error = %e, "Error deleting businesses");
    }

    if let Err(e) = state.store.delete_for_tenant(&req.tenant_id).await {
        tracing::error!(tenant_id = %req.tenant_id, error = %e, "Error deleting subscriptions");
    }

    state.identity.delete_user(&req.tenant_id).await?;

    tracing::info!(tenant_id = %req.tenant_id, "Account deleted");
    Ok(Json(DeleteAccountResponse { success: true }))
}
