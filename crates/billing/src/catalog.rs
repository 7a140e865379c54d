//! Static plan catalog
//!
//! Code-defined and immutable at runtime. Provider-specific price/plan ids
//! live in [`crate::config::BillingConfig`], not here; the catalog only knows
//! display metadata and limits.

use serde::Serialize;

/// A subscription plan offered to business owners
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    /// Monthly price in USD
    pub price: u32,
    /// Review requests included per month; None = unlimited
    pub review_requests: Option<u32>,
    pub features: &'static [&'static str],
    pub popular: bool,
}

/// All plans, cheapest first
pub const PLANS: &[Plan] = &[
    Plan {
        id: "starter",
        name: "Starter",
        price: 29,
        review_requests: Some(100),
        features: &[
            "Up to 100 review requests per month",
            "Basic sentiment analysis",
            "Email notifications",
            "Basic analytics dashboard",
        ],
        popular: false,
    },
    Plan {
        id: "professional",
        name: "Professional",
        price: 59,
        review_requests: Some(500),
        features: &[
            "Up to 500 review requests per month",
            "Advanced AI sentiment analysis",
            "SMS + Email notifications",
            "Advanced analytics & insights",
            "Custom widget branding",
            "Priority support",
        ],
        popular: true,
    },
    Plan {
        id: "enterprise",
        name: "Enterprise",
        price: 99,
        review_requests: None,
        features: &[
            "Unlimited review requests",
            "Advanced AI sentiment analysis",
            "SMS + Email notifications",
            "Advanced analytics & insights",
            "Custom widget branding",
            "White-label solution",
            "Dedicated account manager",
            "API access",
            "Custom integrations",
        ],
        popular: false,
    },
];

/// Find a plan by its catalog id (case-insensitive)
pub fn find(plan_id: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|p| p.id.eq_ignore_ascii_case(plan_id))
}

/// Display name for a plan id, falling back to the raw id when unknown.
/// Unknown ids are expected: the front end may pass a provider-native
/// price/plan reference straight through.
pub fn display_name(plan_id: &str) -> String {
    find(plan_id)
        .map(|p| p.name.to_string())
        .unwrap_or_else(|| plan_id.to_string())
}
