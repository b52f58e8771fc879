use crate::error::{LoanError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

/// One period of an amortization schedule.
///
/// Everything except the settlement fields is fixed when the schedule is
/// generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentScheduleEntry {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
    pub remaining_balance: Decimal,
    #[serde(default)]
    pub status: SettlementStatus,
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
    #[serde(default)]
    pub paid_amount: Option<Decimal>,
}

impl PaymentScheduleEntry {
    /// Settles the entry. Paying an already-paid entry is rejected.
    pub fn mark_paid(&mut self, amount: Decimal, on: NaiveDate) -> Result<()> {
        self.ensure_unpaid()?;
        self.status = SettlementStatus::Paid;
        self.paid_on = Some(on);
        self.paid_amount = Some(amount);
        Ok(())
    }

    /// Records a failed charge. Returns whether the entry just became overdue;
    /// a charge cannot fail for an entry that is already paid.
    pub fn mark_failed(&mut self) -> Result<bool> {
        self.ensure_unpaid()?;
        Ok(self.mark_overdue())
    }

    fn ensure_unpaid(&self) -> Result<()> {
        if self.status == SettlementStatus::Paid {
            return Err(LoanError::Validation(vec![crate::error::FieldError::new(
                format!("schedule[{}]", self.sequence),
                "entry is already paid",
            )]));
        }
        Ok(())
    }

    /// Flags an unpaid entry as overdue; paid entries are left alone.
    pub fn mark_overdue(&mut self) -> bool {
        if self.status == SettlementStatus::Pending {
            self.status = SettlementStatus::Overdue;
            true
        } else {
            false
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == SettlementStatus::Paid
    }
}

/// Sum of every period's total payment.
pub fn total_of_payments(schedule: &[PaymentScheduleEntry]) -> Decimal {
    schedule.iter().map(|entry| entry.total).sum()
}

/// Total interest the borrower pays over the life of the loan.
pub fn finance_charge(schedule: &[PaymentScheduleEntry], principal: Decimal) -> Decimal {
    total_of_payments(schedule) - principal
}
