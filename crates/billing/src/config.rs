//! Billing configuration
//!
//! All provider credentials and plan references are read once at process
//! start and injected into the provider clients; nothing in the billing core
//! reads the environment at call time.

use reviewloop_shared::ProviderKind;

use crate::error::{BillingError, BillingResult};

/// Which provider client to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelection {
    Stripe,
    Paypal,
    /// Deterministic in-process double, for development and tests
    Simulated,
}

impl std::str::FromStr for ProviderSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stripe" => Ok(Self::Stripe),
            "paypal" => Ok(Self::Paypal),
            "simulated" => Ok(Self::Simulated),
            _ => Err(format!("Invalid payment provider selection: {}", s)),
        }
    }
}

/// Provider environment, selects the API base URL for providers that split
/// sandbox and live hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderEnvironment {
    #[default]
    Sandbox,
    Live,
}

impl ProviderEnvironment {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::str::FromStr for ProviderEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "live" | "production" => Ok(Self::Live),
            _ => Err(format!("Invalid provider environment: {}", s)),
        }
    }
}

/// Stripe API credentials
#[derive(Debug, Clone)]
pub struct StripeCredentials {
    pub secret_key: String,
}

/// PayPal REST credentials (client-credentials OAuth exchange)
#[derive(Debug, Clone)]
pub struct PaypalCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Provider-specific references for each catalog plan
#[derive(Debug, Clone, Default)]
pub struct PlanRefs {
    pub starter: String,
    pub professional: String,
    pub enterprise: String,
}

impl PlanRefs {
    /// Look up the provider reference for a catalog plan id
    pub fn for_plan(&self, plan_id: &str) -> Option<&str> {
        match plan_id.to_lowercase().as_str() {
            "starter" => Some(&self.starter),
            "professional" => Some(&self.professional),
            "enterprise" => Some(&self.enterprise),
            _ => None,
        }
    }
}

/// Configuration for the billing core
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Which provider client to run with
    pub provider: ProviderSelection,
    pub environment: ProviderEnvironment,
    pub stripe: Option<StripeCredentials>,
    pub paypal: Option<PaypalCredentials>,
    /// Stripe price ids per plan
    pub stripe_prices: PlanRefs,
    /// PayPal billing plan ids per plan
    pub paypal_plans: PlanRefs,
    /// Base URL for success/cancel redirects
    pub app_base_url: String,
}

impl BillingConfig {
    /// Create config from environment variables.
    ///
    /// Credentials for the selected provider are required; missing values
    /// fail fast here rather than on the first outbound call.
    pub fn from_env() -> BillingResult<Self> {
        let provider: ProviderSelection = std::env::var("PAYMENT_PROVIDER")
            .unwrap_or_else(|_| "paypal".to_string())
            .parse()
            .map_err(BillingError::Config)?;

        let environment: ProviderEnvironment = std::env::var("PAYMENT_ENVIRONMENT")
            .unwrap_or_else(|_| "sandbox".to_string())
            .parse()
            .map_err(BillingError::Config)?;

        let stripe = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|secret_key| StripeCredentials { secret_key });

        let paypal = match (
            std::env::var("PAYPAL_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            std::env::var("PAYPAL_CLIENT_SECRET").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(client_id), Some(client_secret)) => Some(PaypalCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let config = Self {
            provider,
            environment,
            stripe,
            paypal,
            stripe_prices: PlanRefs {
                starter: std::env::var("STRIPE_PRICE_STARTER")
                    .unwrap_or_else(|_| "price_starter".to_string()),
                professional: std::env::var("STRIPE_PRICE_PROFESSIONAL")
                    .unwrap_or_else(|_| "price_professional".to_string()),
                enterprise: std::env::var("STRIPE_PRICE_ENTERPRISE")
                    .unwrap_or_else(|_| "price_enterprise".to_string()),
            },
            paypal_plans: PlanRefs {
                starter: std::env::var("PAYPAL_PLAN_STARTER")
                    .unwrap_or_else(|_| "P-STARTER".to_string()),
                professional: std::env::var("PAYPAL_PLAN_PROFESSIONAL")
                    .unwrap_or_else(|_| "P-PROFESSIONAL".to_string()),
                enterprise: std::env::var("PAYPAL_PLAN_ENTERPRISE")
                    .unwrap_or_else(|_| "P-ENTERPRISE".to_string()),
            },
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        };

        config.require_selected_credentials()?;
        Ok(config)
    }

    fn require_selected_credentials(&self) -> BillingResult<()> {
        match self.provider {
            ProviderSelection::Stripe if self.stripe.is_none() => Err(
                BillingError::ProviderAuth("STRIPE_SECRET_KEY not set".to_string()),
            ),
            ProviderSelection::Paypal if self.paypal.is_none() => Err(BillingError::ProviderAuth(
                "PAYPAL_CLIENT_ID / PAYPAL_CLIENT_SECRET not set".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Provider reference (price or plan id) for a catalog plan, per provider
    pub fn provider_plan_ref(&self, provider: ProviderKind, plan_id: &str) -> Option<&str> {
        match provider {
            ProviderKind::Stripe => self.stripe_prices.for_plan(plan_id),
            ProviderKind::Paypal => self.paypal_plans.for_plan(plan_id),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_selection_parse() {
        assert_eq!(
            "stripe".parse::<ProviderSelection>().unwrap(),
            ProviderSelection::Stripe
        );
        assert_eq!(
            "PayPal".parse::<ProviderSelection>().unwrap(),
            ProviderSelection::Paypal
        );
        assert_eq!(
            "simulated".parse::<ProviderSelection>().unwrap(),
            ProviderSelection::Simulated
        );
        assert!("venmo".parse::<ProviderSelection>().is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(
            "sandbox".parse::<ProviderEnvironment>().unwrap(),
            ProviderEnvironment::Sandbox
        );
        assert_eq!(
            "live".parse::<ProviderEnvironment>().unwrap(),
            ProviderEnvironment::Live
        );
        assert!("staging".parse::<ProviderEnvironment>().is_err());
    }

    #[test]
    fn test_missing_selected_credentials_fail_fast() {
        let config = BillingConfig {
            provider: ProviderSelection::Paypal,
            environment: ProviderEnvironment::Sandbox,
            stripe: None,
            paypal: None,
            stripe_prices: PlanRefs::default(),
            paypal_plans: PlanRefs::default(),
            app_base_url: "http://localhost:3000".to_string(),
        };
        match config.require_selected_credentials() {
            Err(BillingError::ProviderAuth(msg)) => {
                assert!(msg.contains("PAYPAL_CLIENT_ID"));
            }
            other => panic!("expected ProviderAuth error, got {:?}", other),
        }
    }

    #[test]
    fn test_simulated_needs_no_credentials() {
        let config = BillingConfig {
            provider: ProviderSelection::Simulated,
            environment: ProviderEnvironment::Sandbox,
            stripe: None,
            paypal: None,
            stripe_prices: PlanRefs::default(),
            paypal_plans: PlanRefs::default(),
            app_base_url: "http://localhost:3000".to_string(),
        };
        assert!(config.require_selected_credentials().is_ok());
    }

    #[test]
    fn test_provider_plan_ref_lookup() {
        let config = BillingConfig {
            provider: ProviderSelection::Simulated,
            environment: ProviderEnvironment::Sandbox,
            stripe: None,
            paypal: None,
            stripe_prices: PlanRefs {
                starter: "price_123".to_string(),
                professional: "price_456".to_string(),
                enterprise: "price_789".to_string(),
            },
            paypal_plans: PlanRefs {
                starter: "P-123".to_string(),
                professional: "P-456".to_string(),
                enterprise: "P-789".to_string(),
            },
            app_base_url: "http://localhost:3000".to_string(),
        };
        assert_eq!(
            config.provider_plan_ref(ProviderKind::Stripe, "starter"),
            Some("price_123")
        );
        assert_eq!(
            config.provider_plan_ref(ProviderKind::Paypal, "PROFESSIONAL"),
            Some("P-456")
        );
        assert_eq!(config.provider_plan_ref(ProviderKind::Stripe, "custom"), None);
    }
}
