//! Billing error types

use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    /// Credentials are absent or the provider rejected them
    #[error("Provider credentials not configured: {0}")]
    ProviderAuth(String),

    /// The provider rejected the request (non-2xx) or the call failed in transit
    #[error("Provider request failed: {0}")]
    ProviderRequest(String),

    /// The provider answered 2xx but the expected data was missing
    #[error("Unexpected provider response: {0}")]
    ProviderResponse(String),

    /// Business-rule rejection in the approval handler
    #[error("Subscription is not active. Status: {0}")]
    SubscriptionNotActive(String),

    #[error("Database error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BillingError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderAuth(_) => "PROVIDER_AUTH_ERROR",
            Self::ProviderRequest(_) => "PROVIDER_REQUEST_ERROR",
            Self::ProviderResponse(_) => "PROVIDER_RESPONSE_ERROR",
            Self::SubscriptionNotActive(_) => "SUBSCRIPTION_NOT_ACTIVE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Storage(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            BillingError::ProviderAuth("x".into()).code(),
            "PROVIDER_AUTH_ERROR"
        );
        assert_eq!(
            BillingError::SubscriptionNotActive("PENDING".into()).code(),
            "SUBSCRIPTION_NOT_ACTIVE"
        );
        assert_eq!(BillingError::Storage("x".into()).code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_not_active_message_carries_raw_status() {
        let err = BillingError::SubscriptionNotActive("APPROVAL_PENDING".into());
        assert_eq!(
            err.to_string(),
            "Subscription is not active. Status: APPROVAL_PENDING"
        );
    }
}
