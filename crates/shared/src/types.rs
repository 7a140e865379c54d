//! Common types used across ReviewLoop

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Payment provider backing a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    Paypal,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Paypal => "paypal",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stripe" => Ok(Self::Stripe),
            "paypal" => Ok(Self::Paypal),
            _ => Err(format!("Invalid payment provider: {}", s)),
        }
    }
}

/// Normalized subscription status.
///
/// Provider status vocabularies differ (Stripe reports lower-case snake_case,
/// PayPal reports upper-case). Each raw status maps into this closed set via
/// [`SubscriptionStatus::normalize`]; the raw string is stored alongside so
/// nothing the provider said is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Pending,
    Suspended,
    Cancelled,
    PastDue,
    Expired,
    Unknown,
}

impl SubscriptionStatus {
    /// Map a provider-reported status into the normalized set.
    pub fn normalize(provider: ProviderKind, raw: &str) -> Self {
        match provider {
            ProviderKind::Stripe => match raw.to_lowercase().as_str() {
                "active" | "trialing" => Self::Active,
                "incomplete" => Self::Pending,
                "incomplete_expired" => Self::Expired,
                "past_due" | "unpaid" => Self::PastDue,
                "paused" => Self::Suspended,
                "canceled" | "cancelled" => Self::Cancelled,
                _ => Self::Unknown,
            },
            ProviderKind::Paypal => match raw.to_uppercase().as_str() {
                "ACTIVE" => Self::Active,
                "APPROVAL_PENDING" | "APPROVED" => Self::Pending,
                "SUSPENDED" => Self::Suspended,
                "CANCELLED" => Self::Cancelled,
                "EXPIRED" => Self::Expired,
                _ => Self::Unknown,
            },
        }
    }

    /// Whether this status gates feature access on (the approval handler
    /// only persists subscriptions in this state).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Suspended => "suspended",
            Self::Cancelled => "cancelled",
            Self::PastDue => "past_due",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Subscription model: one row per tenant, reconciled from provider state
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub tenant_id: String,
    pub provider: String,
    pub provider_subscription_id: String,
    pub plan_name: String,
    /// Normalized status (see [`SubscriptionStatus`])
    pub status: String,
    /// Provider-reported status, lower-cased
    pub raw_status: String,
    pub current_period_start: Option<OffsetDateTime>,
    pub current_period_end: Option<OffsetDateTime>,
    pub cancelled_at: Option<OffsetDateTime>,
    pub metadata: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Subscription {
    /// Parse the stored provider column
    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.provider.parse().ok()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_display_and_parse() {
        assert_eq!(format!("{}", ProviderKind::Stripe), "stripe");
        assert_eq!(format!("{}", ProviderKind::Paypal), "paypal");
        assert_eq!("stripe".parse::<ProviderKind>().unwrap(), ProviderKind::Stripe);
        assert_eq!("PayPal".parse::<ProviderKind>().unwrap(), ProviderKind::Paypal);
        assert!("square".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_normalize_stripe_statuses() {
        let n = |raw| SubscriptionStatus::normalize(ProviderKind::Stripe, raw);
        assert_eq!(n("active"), SubscriptionStatus::Active);
        assert_eq!(n("trialing"), SubscriptionStatus::Active);
        assert_eq!(n("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(n("unpaid"), SubscriptionStatus::PastDue);
        assert_eq!(n("canceled"), SubscriptionStatus::Cancelled);
        assert_eq!(n("paused"), SubscriptionStatus::Suspended);
        assert_eq!(n("incomplete"), SubscriptionStatus::Pending);
        assert_eq!(n("incomplete_expired"), SubscriptionStatus::Expired);
        assert_eq!(n("something_new"), SubscriptionStatus::Unknown);
    }

    #[test]
    fn test_normalize_paypal_statuses() {
        let n = |raw| SubscriptionStatus::normalize(ProviderKind::Paypal, raw);
        assert_eq!(n("ACTIVE"), SubscriptionStatus::Active);
        assert_eq!(n("active"), SubscriptionStatus::Active); // case-insensitive
        assert_eq!(n("APPROVAL_PENDING"), SubscriptionStatus::Pending);
        assert_eq!(n("APPROVED"), SubscriptionStatus::Pending);
        assert_eq!(n("SUSPENDED"), SubscriptionStatus::Suspended);
        assert_eq!(n("CANCELLED"), SubscriptionStatus::Cancelled);
        assert_eq!(n("EXPIRED"), SubscriptionStatus::Expired);
        assert_eq!(n("BANANAS"), SubscriptionStatus::Unknown);
    }

    #[test]
    fn test_only_active_gates_access() {
        assert!(SubscriptionStatus::Active.is_active());
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Suspended,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Unknown,
        ] {
            assert!(!status.is_active(), "{status} must not gate access on");
        }
    }

    #[test]
    fn test_status_render_is_lowercase() {
        assert_eq!(SubscriptionStatus::Active.as_str(), "active");
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
    }
}
