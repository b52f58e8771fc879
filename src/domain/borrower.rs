use super::loan::{BorrowerId, OrganizationId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of reference-contact slots on a borrower and on the contract.
pub const REFERENCE_SLOTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

impl Address {
    /// Single-line form, e.g. `12 Main St Apt 4, Miami, FL 33101`.
    pub fn one_line(&self) -> String {
        let street = match self.unit.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(unit) => format!("{} {}", self.street, unit),
            None => self.street.clone(),
        };
        format!("{}, {}, {} {}", street, self.city, self.state, self.zip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Retired,
    Unemployed,
    Other,
}

impl EmploymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EmploymentStatus::Employed => "Employed",
            EmploymentStatus::SelfEmployed => "Self-Employed",
            EmploymentStatus::Retired => "Retired",
            EmploymentStatus::Unemployed => "Unemployed",
            EmploymentStatus::Other => "Other",
        }
    }

    pub fn requires_employer(&self) -> bool {
        matches!(self, EmploymentStatus::Employed | EmploymentStatus::SelfEmployed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Employment {
    #[serde(default)]
    pub status: Option<EmploymentStatus>,
    #[serde(default)]
    pub employer: Option<String>,
    #[serde(default)]
    pub monthly_income: Option<Decimal>,
    #[serde(default)]
    pub months_employed: Option<u32>,
}

/// A personal reference. Each part is independently optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Reference {
    /// A reference counts only when it has a non-blank name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowerVerification {
    #[default]
    Unverified,
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    pub id: BorrowerId,
    pub organization_id: OrganizationId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub employment: Employment,
    #[serde(default)]
    pub references: [Reference; REFERENCE_SLOTS],
    #[serde(default)]
    pub verification: BorrowerVerification,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Borrower {
    pub fn new(
        organization_id: OrganizationId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            organization_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email,
            phone: None,
            date_of_birth: None,
            address: Address::default(),
            employment: Employment::default(),
            references: Default::default(),
            verification: BorrowerVerification::Unverified,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// The email, if present and not blank.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn is_verified(&self) -> bool {
        self.verification == BorrowerVerification::Verified
    }
}
