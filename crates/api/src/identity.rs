//! Identity-provider admin client
//!
//! Account deletion must run with the service-role key, never from the
//! browser. This is the only privileged identity operation the service
//! performs.

use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct IdentityAdmin {
    base_url: String,
    service_role_key: String,
    client: reqwest::Client,
}

impl IdentityAdmin {
    pub fn new(base_url: String, service_role_key: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key,
            client,
        }
    }

    /// Delete the user record at the identity provider.
    pub async fn delete_user(&self, user_id: &str) -> ApiResult<()> {
        if self.base_url.is_empty() || self.service_role_key.is_empty() {
            return Err(ApiError::Identity(
                "Identity provider not configured".to_string(),
            ));
        }

        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, user_id);
        let resp = self
            .client
            .delete(&url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| ApiError::Identity(format!("Identity request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Identity(format!(
                "Failed to delete user: {} - {}",
                status.as_u16(),
                body
            )));
        }

        tracing::info!(user_id = %user_id, "Deleted identity-provider user");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_identity_is_an_error() {
        let identity = IdentityAdmin::new(String::new(), String::new(), reqwest::Client::new());
        let err = identity.delete_user("u1").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_delete_user_calls_admin_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/auth/v1/admin/users/u1")
            .match_header("apikey", "service-key")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let identity = IdentityAdmin::new(
            server.url(),
            "service-key".to_string(),
            reqwest::Client::new(),
        );
        identity.delete_user("u1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_provider_rejection_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/auth/v1/admin/users/u2")
            .with_status(404)
            .with_body(r#"{"msg":"User not found"}"#)
            .create_async()
            .await;

        let identity = IdentityAdmin::new(
            server.url(),
            "service-key".to_string(),
            reqwest::Client::new(),
        );
        let err = identity.delete_user("u2").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
