//! Level-payment amortization.
//!
//! Everything here is pure and deterministic: the generated ledger is embedded
//! verbatim into the signed contract and has to be reproducible later.

use super::loan::PaymentFrequency;
use super::money::round_currency;
use super::schedule::{PaymentScheduleEntry, SettlementStatus};
use crate::error::{LoanError, Result};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

/// Longest accepted term: 30 years of weekly payments.
pub const MAX_PERIODS: u32 = 1560;

/// Converts an annual percentage rate (`9.99`) into the per-period rate.
pub fn periodic_rate(annual_percent: Decimal, frequency: PaymentFrequency) -> Result<Decimal> {
    if annual_percent < Decimal::ZERO {
        return Err(LoanError::InvalidRate(annual_percent));
    }
    Ok(annual_percent / Decimal::ONE_HUNDRED / Decimal::from(frequency.periods_per_year()))
}

/// The rounded level payment for `periods` periods at `rate` per period.
pub fn level_payment(principal: Decimal, rate: Decimal, periods: u32) -> Result<Decimal> {
    validate(principal, rate, periods)?;

    let payment = if rate.is_zero() {
        principal / Decimal::from(periods)
    } else {
        let growth = compound(rate, periods).ok_or(LoanError::InvalidTerm(periods))?;
        rate.checked_mul(growth)
            .and_then(|scaled| principal.checked_mul(scaled))
            .and_then(|numerator| numerator.checked_div(growth - Decimal::ONE))
            .ok_or(LoanError::InvalidTerm(periods))?
    };

    let payment = round_currency(payment);
    if payment <= Decimal::ZERO {
        // principal too small to spread over the term at cent precision
        return Err(LoanError::InvalidPrincipal(principal));
    }
    Ok(payment)
}

/// Generates the payment ledger.
///
/// Period `k` is due `start_date + k * period_days`. The last period takes
/// whatever principal is left so the balance closes at exactly zero.
pub fn schedule(
    principal: Decimal,
    rate: Decimal,
    periods: u32,
    start_date: NaiveDate,
    period_days: u32,
) -> Result<Vec<PaymentScheduleEntry>> {
    let payment = level_payment(principal, rate, periods)?;

    let mut balance = principal;
    let mut entries = Vec::with_capacity(periods as usize);

    for sequence in 1..=periods {
        let interest = round_currency(
            balance
                .checked_mul(rate)
                .ok_or(LoanError::InvalidRate(rate))?,
        );
        let principal_portion = if sequence == periods {
            balance
        } else {
            (payment - interest).min(balance).max(Decimal::ZERO)
        };
        let total = principal_portion + interest;
        balance = (balance - principal_portion).max(Decimal::ZERO);

        entries.push(PaymentScheduleEntry {
            sequence,
            due_date: due_date(start_date, sequence, period_days)?,
            principal: principal_portion,
            interest,
            total,
            remaining_balance: balance,
            status: SettlementStatus::Pending,
            paid_on: None,
            paid_amount: None,
        });
    }

    Ok(entries)
}

fn validate(principal: Decimal, rate: Decimal, periods: u32) -> Result<()> {
    if periods == 0 || periods > MAX_PERIODS {
        return Err(LoanError::InvalidTerm(periods));
    }
    if principal <= Decimal::ZERO {
        return Err(LoanError::InvalidPrincipal(principal));
    }
    if rate < Decimal::ZERO {
        return Err(LoanError::InvalidRate(rate));
    }
    Ok(())
}

/// `(1 + rate)^periods` by repeated multiplication, keeping full decimal
/// precision. `None` once the result no longer fits in a `Decimal`.
fn compound(rate: Decimal, periods: u32) -> Option<Decimal> {
    let base = Decimal::ONE.checked_add(rate)?;
    (0..periods).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(base))
}

fn due_date(start: NaiveDate, sequence: u32, period_days: u32) -> Result<NaiveDate> {
    let offset = u64::from(sequence) * u64::from(period_days);
    start
        .checked_add_days(Days::new(offset))
        .ok_or(LoanError::InvalidTerm(sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn test_monthly_textbook_payment() {
        // $1,000 at 12% APR over 12 months is the classic $88.85 payment
        let rate = periodic_rate(dec!(12), PaymentFrequency::Monthly).unwrap();
        assert_eq!(rate, dec!(0.01));
        assert_eq!(level_payment(dec!(1000), rate, 12).unwrap(), dec!(88.85));

        let entries = schedule(dec!(1000), rate, 12, start(), 30).unwrap();
        assert_eq!(entries[0].interest, dec!(10.00));
        assert_eq!(entries[0].principal, dec!(78.85));
        assert_eq!(entries[0].remaining_balance, dec!(921.15));
        assert_eq!(entries[11].principal, dec!(87.96));
        assert_eq!(entries[11].total, dec!(88.84));
        assert_eq!(entries[11].remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_zero_rate_splits_evenly() {
        let entries = schedule(dec!(100), Decimal::ZERO, 3, start(), 7).unwrap();
        let principals: Vec<_> = entries.iter().map(|e| e.principal).collect();
        assert_eq!(principals, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
        assert!(entries.iter().all(|e| e.interest.is_zero()));
        assert_eq!(entries[2].remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_due_dates_follow_period_length() {
        let entries = schedule(dec!(500), dec!(0.01), 3, start(), 7).unwrap();
        let dates: Vec<_> = entries.iter().map(|e| e.due_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 26).unwrap(),
            ]
        );
        let sequences: Vec<_> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            schedule(dec!(100), dec!(0.01), 0, start(), 7),
            Err(LoanError::InvalidTerm(0))
        ));
        assert!(matches!(
            schedule(dec!(0), dec!(0.01), 4, start(), 7),
            Err(LoanError::InvalidPrincipal(_))
        ));
        assert!(matches!(
            schedule(dec!(-5), dec!(0.01), 4, start(), 7),
            Err(LoanError::InvalidPrincipal(_))
        ));
        assert!(matches!(
            schedule(dec!(100), dec!(-0.01), 4, start(), 7),
            Err(LoanError::InvalidRate(_))
        ));
        assert!(matches!(
            periodic_rate(dec!(-1), PaymentFrequency::Weekly),
            Err(LoanError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_payment_rounding_to_zero_is_rejected() {
        assert!(matches!(
            level_payment(dec!(0.01), Decimal::ZERO, 52),
            Err(LoanError::InvalidPrincipal(_))
        ));
    }

    #[test]
    fn test_overlong_terms_are_rejected() {
        assert!(matches!(
            schedule(dec!(1000), dec!(0.01), 10_000, start(), 30),
            Err(LoanError::InvalidTerm(10_000))
        ));
        assert!(matches!(
            level_payment(dec!(1000), dec!(0.01), MAX_PERIODS + 1),
            Err(LoanError::InvalidTerm(_))
        ));
        let longest = schedule(dec!(25000), dec!(0.0019), MAX_PERIODS, start(), 7).unwrap();
        assert_eq!(longest.len(), MAX_PERIODS as usize);
        assert_eq!(longest.last().unwrap().remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_growth_overflow_is_an_error() {
        // (1 + 9)^1000 does not fit in a Decimal
        assert!(matches!(
            level_payment(dec!(1000), dec!(9), 1000),
            Err(LoanError::InvalidTerm(1000))
        ));
        assert!(matches!(
            schedule(dec!(1000), dec!(9), 1000, start(), 30),
            Err(LoanError::InvalidTerm(1000))
        ));
    }

    #[test]
    fn test_deterministic() {
        let a = schedule(dec!(7300), dec!(0.0025), 40, start(), 14).unwrap();
        let b = schedule(dec!(7300), dec!(0.0025), 40, start(), 14).unwrap();
        assert_eq!(a, b);
    }
}
