//! Flattens loan, borrower, dealership and schedule data into the positional
//! label/value fields the contract template expects.
//!
//! The template addresses fields by label, so labels and their order are part
//! of the contract with the signing provider. Bump [`SCHEMA_VERSION`] whenever
//! a table below changes.

use crate::domain::borrower::{Borrower, REFERENCE_SLOTS, Reference};
use crate::domain::envelope::Field;
use crate::domain::loan::Loan;
use crate::domain::money::{format_currency, format_percent};
use crate::domain::organization::Organization;
use crate::domain::phone::{self, PhoneNumber};
use crate::domain::schedule::{self as ledger, PaymentScheduleEntry};
use crate::error::{LoanError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Number of payment rows the contract template has room for.
pub const MAX_SCHEDULE_SLOTS: usize = 52;

/// Labels of the four fields in each payment row.
const SLOT_COLUMNS: [&str; 4] = ["Due Date", "Principal", "Amount", "Balance"];

/// Labels of the three fields in each reference slot.
const REFERENCE_COLUMNS: [&str; 3] = ["Name", "Phone", "Email"];

/// The funding lender printed on every contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderIdentity {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
}

/// Field sets scoped to the party that fills or reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedFields {
    pub schema_version: u32,
    pub lender: Vec<Field>,
    pub borrower: Vec<Field>,
}

struct Context<'a> {
    loan: &'a Loan,
    borrower: &'a Borrower,
    organization: &'a Organization,
    lender: &'a LenderIdentity,
    schedule: &'a [PaymentScheduleEntry],
    today: NaiveDate,
    email: &'a str,
    vin: &'a str,
    phone: PhoneNumber,
}

type Accessor = for<'a> fn(&Context<'a>) -> String;

fn date(value: NaiveDate) -> String {
    value.format("%m/%d/%Y").to_string()
}

const LENDER_FIELDS: &[(&str, Accessor)] = &[
    ("Dealership Name", |c| c.organization.name.clone()),
    ("Dealership Address", |c| c.organization.address.one_line()),
    ("Dealership Phone", |c| {
        c.organization.phone.clone().unwrap_or_default()
    }),
    ("Lender Name", |c| c.lender.name.clone()),
    ("Lender Address", |c| c.lender.street.clone()),
    ("Lender City", |c| c.lender.city.clone()),
    ("Lender State", |c| c.lender.state.clone()),
    ("Lender Zip", |c| c.lender.zip.clone()),
    ("Lender Phone", |c| c.lender.phone.clone()),
    ("Vehicle Year", |c| c.loan.vehicle.year.to_string()),
    ("Vehicle Make", |c| c.loan.vehicle.make.clone()),
    ("Vehicle Model", |c| c.loan.vehicle.model.clone()),
    ("Vehicle VIN", |c| c.vin.to_string()),
    ("Loan Amount", |c| format_currency(c.loan.principal)),
    ("Interest Rate", |c| format_percent(c.loan.annual_rate)),
    ("Payment Amount", |c| format_currency(c.loan.payment)),
    ("Total of Payments", |c| {
        format_currency(ledger::total_of_payments(c.schedule))
    }),
    ("Finance Charge", |c| {
        format_currency(ledger::finance_charge(c.schedule, c.loan.principal))
    }),
    ("Number of Payments", |c| c.loan.periods.to_string()),
    ("Payment Frequency", |c| c.loan.frequency.label().to_string()),
    ("First Payment Date", |c| {
        c.schedule
            .first()
            .map(|entry| entry.due_date)
            .or_else(|| {
                c.today
                    .checked_add_days(Days::new(u64::from(c.loan.frequency.period_days())))
            })
            .map(date)
            .unwrap_or_default()
    }),
    ("Document Date", |c| date(c.today)),
];

const BORROWER_FIELDS: &[(&str, Accessor)] = &[
    ("Borrower Name", |c| c.borrower.full_name()),
    ("Borrower First Name", |c| c.borrower.first_name.trim().to_string()),
    ("Borrower Last Name", |c| c.borrower.last_name.trim().to_string()),
    ("Borrower Email", |c| c.email.to_string()),
    ("Borrower Date of Birth", |c| {
        c.borrower.date_of_birth.map(date).unwrap_or_default()
    }),
    ("Borrower Phone Country Code", |c| c.phone.country_code.clone()),
    ("Borrower Phone Number", |c| c.phone.national_number.clone()),
    ("Borrower Street", |c| c.borrower.address.street.clone()),
    ("Borrower Unit", |c| {
        c.borrower.address.unit.clone().unwrap_or_default()
    }),
    ("Borrower City", |c| c.borrower.address.city.clone()),
    ("Borrower State", |c| c.borrower.address.state.clone()),
    ("Borrower Zip", |c| c.borrower.address.zip.clone()),
    ("Employment Status", |c| {
        c.borrower
            .employment
            .status
            .map(|status| status.label().to_string())
            .unwrap_or_default()
    }),
    ("Employer", |c| {
        c.borrower.employment.employer.clone().unwrap_or_default()
    }),
    ("Monthly Income", |c| {
        c.borrower
            .employment
            .monthly_income
            .map(format_currency)
            .unwrap_or_default()
    }),
    ("Months Employed", |c| {
        c.borrower
            .employment
            .months_employed
            .map(|months| months.to_string())
            .unwrap_or_default()
    }),
];

/// Truncates `items` to `capacity` and fills the remainder with `empty`.
pub fn pad_to<T: Clone>(items: impl IntoIterator<Item = T>, capacity: usize, empty: T) -> Vec<T> {
    let mut padded: Vec<T> = items.into_iter().take(capacity).collect();
    padded.resize(capacity, empty);
    padded
}

fn schedule_row(slot: usize, entry: Option<&PaymentScheduleEntry>) -> [Field; 4] {
    let values = match entry {
        Some(entry) => [
            date(entry.due_date),
            format_currency(entry.principal),
            format_currency(entry.total),
            format_currency(entry.remaining_balance),
        ],
        None => Default::default(),
    };
    let [due, principal, amount, balance] = values;
    let label = |column: &str| format!("Payment {slot} {column}");
    [
        Field::new(label(SLOT_COLUMNS[0]), due),
        Field::new(label(SLOT_COLUMNS[1]), principal),
        Field::new(label(SLOT_COLUMNS[2]), amount),
        Field::new(label(SLOT_COLUMNS[3]), balance),
    ]
}

fn reference_row(slot: usize, reference: Option<&Reference>) -> [Field; 3] {
    let label = |column: &str| format!("Reference {slot} {column}");
    let values = match reference.and_then(|r| r.name().map(|name| (name, r))) {
        Some((name, r)) => [
            name.to_string(),
            r.phone
                .as_deref()
                .map(|p| phone::normalize(p).national_number)
                .unwrap_or_default(),
            r.email
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        ],
        None => Default::default(),
    };
    let [name, phone, email] = values;
    [
        Field::new(label(REFERENCE_COLUMNS[0]), name),
        Field::new(label(REFERENCE_COLUMNS[1]), phone),
        Field::new(label(REFERENCE_COLUMNS[2]), email),
    ]
}

/// Builds the signer-scoped field sets for a contract.
pub struct FieldSynthesizer {
    lender: LenderIdentity,
}

impl FieldSynthesizer {
    pub fn new(lender: LenderIdentity) -> Self {
        Self { lender }
    }

    pub fn lender(&self) -> &LenderIdentity {
        &self.lender
    }

    /// Pure: the same inputs always produce the same fields in the same order.
    pub fn synthesize(
        &self,
        loan: &Loan,
        borrower: &Borrower,
        organization: &Organization,
        schedule: &[PaymentScheduleEntry],
        today: NaiveDate,
    ) -> Result<SynthesizedFields> {
        let email = borrower
            .email()
            .ok_or(LoanError::MissingRequiredField("borrower.email"))?;
        let vin = loan
            .vin()
            .ok_or(LoanError::MissingRequiredField("vehicle.vin"))?;

        let context = Context {
            loan,
            borrower,
            organization,
            lender: &self.lender,
            schedule,
            today,
            email,
            vin,
            phone: phone::normalize_opt(borrower.phone.as_deref()),
        };

        let mut lender: Vec<Field> = LENDER_FIELDS
            .iter()
            .map(|(label, accessor)| Field::new(*label, accessor(&context)))
            .collect();
        let slots = pad_to(schedule.iter().map(Some), MAX_SCHEDULE_SLOTS, None);
        for (index, entry) in slots.into_iter().enumerate() {
            lender.extend(schedule_row(index + 1, entry));
        }

        let mut borrower_fields: Vec<Field> = BORROWER_FIELDS
            .iter()
            .map(|(label, accessor)| Field::new(*label, accessor(&context)))
            .collect();
        let references = pad_to(
            borrower.references.iter().map(Some),
            REFERENCE_SLOTS,
            None,
        );
        for (index, reference) in references.into_iter().enumerate() {
            borrower_fields.extend(reference_row(index + 1, reference));
        }

        Ok(SynthesizedFields {
            schema_version: SCHEMA_VERSION,
            lender,
            borrower: borrower_fields,
        })
    }
}
