use super::borrower::Address;
use super::loan::OrganizationId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Trialing,
    Active,
    PastDue,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Billing {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub customer_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub loan_origination: bool,
    #[serde(default)]
    pub identity_verification: bool,
    /// Loans may only go out for signature once the borrower is verified.
    #[serde(default)]
    pub require_verified_borrower: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            loan_origination: true,
            identity_verification: false,
            require_verified_borrower: false,
        }
    }
}

/// A dealership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub contact_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub billing: Billing,
    #[serde(default)]
    pub features: FeatureFlags,
}
