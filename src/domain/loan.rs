use super::amortization;
use super::envelope::EnvelopeRef;
use super::state_machine::LoanStatus;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LoanId = Uuid;
pub type BorrowerId = Uuid;
pub type OrganizationId = Uuid;

/// Repayment cadence. Fixes both the period length and the periodic rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFrequency {
    #[default]
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    pub fn period_days(&self) -> u32 {
        match self {
            PaymentFrequency::Weekly => 7,
            PaymentFrequency::Biweekly => 14,
            PaymentFrequency::Monthly => 30,
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Weekly => 52,
            PaymentFrequency::Biweekly => 26,
            PaymentFrequency::Monthly => 12,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentFrequency::Weekly => "Weekly",
            PaymentFrequency::Biweekly => "Bi-Weekly",
            PaymentFrequency::Monthly => "Monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vehicle {
    pub year: u16,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub vin: Option<String>,
}

/// Outcome of the last interaction with the e-signature provider.
///
/// Kept separate from [`LoanStatus`] so a provider failure is visible without
/// blocking anything else on the loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderStatus {
    Sent,
    Failed {
        kind: ProviderFailureKind,
        detail: String,
        at: DateTime<Utc>,
    },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailureKind {
    Unreachable,
    Rejected,
}

/// Terms supplied when a dealership starts a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoan {
    pub principal: Decimal,
    /// Annual percentage rate, e.g. `9.99`.
    pub annual_rate: Decimal,
    pub periods: u32,
    #[serde(default)]
    pub frequency: PaymentFrequency,
    pub vehicle: Vehicle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub organization_id: OrganizationId,
    pub borrower_id: BorrowerId,
    pub principal: Decimal,
    pub annual_rate: Decimal,
    pub periods: u32,
    pub frequency: PaymentFrequency,
    pub payment: Decimal,
    pub vehicle: Vehicle,
    status: LoanStatus,
    pub provider_status: Option<ProviderStatus>,
    pub envelope: Option<EnvelopeRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Creates a loan in `new` status.
    ///
    /// Fails when principal, rate or term are out of range, or when the
    /// resulting level payment would round to zero.
    pub fn new(
        request: NewLoan,
        organization_id: OrganizationId,
        borrower_id: BorrowerId,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let rate = amortization::periodic_rate(request.annual_rate, request.frequency)?;
        let payment = amortization::level_payment(request.principal, rate, request.periods)?;

        Ok(Self {
            id: Uuid::new_v4(),
            organization_id,
            borrower_id,
            principal: request.principal,
            annual_rate: request.annual_rate,
            periods: request.periods,
            frequency: request.frequency,
            payment,
            vehicle: request.vehicle,
            status: LoanStatus::New,
            provider_status: None,
            envelope: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    /// Only the state machine moves a loan between statuses.
    pub(crate) fn set_status(&mut self, status: LoanStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    pub fn periodic_rate(&self) -> Result<Decimal> {
        amortization::periodic_rate(self.annual_rate, self.frequency)
    }

    pub fn vin(&self) -> Option<&str> {
        self.vehicle
            .vin
            .as_deref()
            .map(str::trim)
            .filter(|vin| !vin.is_empty())
    }
}
