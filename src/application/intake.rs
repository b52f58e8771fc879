//! Borrower-submitted application payload and its validation.

use crate::domain::borrower::{
    Address, Borrower, Employment, EmploymentStatus, REFERENCE_SLOTS, Reference,
};
use crate::error::{FieldError, LoanError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const MINIMUM_AGE: i32 = 18;

/// What the borrower fills in on the online application.
///
/// Every field is optional on the wire so that a partial submission can be
/// answered with the complete list of problems.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub street: Option<String>,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub employment_status: Option<EmploymentStatus>,
    pub employer: Option<String>,
    pub monthly_income: Option<Decimal>,
    pub months_employed: Option<u32>,
    pub references: Vec<Reference>,
}

impl From<&Borrower> for ApplicationForm {
    fn from(borrower: &Borrower) -> Self {
        Self {
            first_name: Some(borrower.first_name.clone()),
            last_name: Some(borrower.last_name.clone()),
            email: borrower.email.clone(),
            phone: borrower.phone.clone(),
            date_of_birth: borrower.date_of_birth,
            street: Some(borrower.address.street.clone()),
            unit: borrower.address.unit.clone(),
            city: Some(borrower.address.city.clone()),
            state: Some(borrower.address.state.clone()),
            zip: Some(borrower.address.zip.clone()),
            employment_status: borrower.employment.status,
            employer: borrower.employment.employer.clone(),
            monthly_income: borrower.employment.monthly_income,
            months_employed: borrower.employment.months_employed,
            references: borrower.references.to_vec(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(char::is_ascii_digit).count()
}

fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

struct Collector(Vec<FieldError>);

impl Collector {
    fn fail(&mut self, field: impl Into<String>, message: &str) {
        self.0.push(FieldError::new(field, message));
    }

    fn required<'a>(&mut self, field: &str, value: &'a Option<String>) -> Option<&'a str> {
        let found = present(value);
        if found.is_none() {
            self.fail(field, "is required");
        }
        found
    }
}

impl ApplicationForm {
    /// Checks the whole form and reports every failing field at once.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let mut errors = Collector(Vec::new());

        errors.required("first_name", &self.first_name);
        errors.required("last_name", &self.last_name);

        if let Some(email) = errors.required("email", &self.email)
            && !is_email(email)
        {
            errors.fail("email", "is not a valid email address");
        }
        if let Some(phone) = errors.required("phone", &self.phone)
            && digit_count(phone) < 10
        {
            errors.fail("phone", "must contain at least 10 digits");
        }
        match self.date_of_birth {
            None => errors.fail("date_of_birth", "is required"),
            Some(birth) if birth > today => errors.fail("date_of_birth", "is in the future"),
            Some(birth) if age_on(birth, today) < MINIMUM_AGE => {
                errors.fail("date_of_birth", "applicant must be at least 18")
            }
            Some(_) => {}
        }

        errors.required("address.street", &self.street);
        errors.required("address.city", &self.city);
        if let Some(state) = errors.required("address.state", &self.state)
            && !(state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic()))
        {
            errors.fail("address.state", "must be a two-letter code");
        }
        if let Some(zip) = errors.required("address.zip", &self.zip)
            && !(zip.len() == 5 && zip.chars().all(|c| c.is_ascii_digit()))
        {
            errors.fail("address.zip", "must be 5 digits");
        }

        match self.employment_status {
            None => errors.fail("employment.status", "is required"),
            Some(status) => {
                if status.requires_employer() {
                    errors.required("employment.employer", &self.employer);
                }
                if status.requires_employer() && self.months_employed.is_none() {
                    errors.fail("employment.months_employed", "is required");
                }
            }
        }
        match self.monthly_income {
            None => errors.fail("employment.monthly_income", "is required"),
            Some(income) if income <= Decimal::ZERO => {
                errors.fail("employment.monthly_income", "must be greater than zero")
            }
            Some(_) => {}
        }

        if self.references.len() > REFERENCE_SLOTS {
            errors.fail("references", "at most 3 references are accepted");
        }
        for (index, reference) in self.references.iter().take(REFERENCE_SLOTS).enumerate() {
            let slot = index + 1;
            let phone = present(&reference.phone);
            let email = present(&reference.email);
            if reference.name().is_none() && (phone.is_some() || email.is_some()) {
                errors.fail(format!("references[{slot}].name"), "is required");
            }
            if let Some(email) = email
                && !is_email(email)
            {
                errors.fail(
                    format!("references[{slot}].email"),
                    "is not a valid email address",
                );
            }
            if let Some(phone) = phone
                && digit_count(phone) < 10
            {
                errors.fail(
                    format!("references[{slot}].phone"),
                    "must contain at least 10 digits",
                );
            }
        }

        if errors.0.is_empty() {
            Ok(())
        } else {
            Err(LoanError::Validation(errors.0))
        }
    }

    /// Copies a validated form onto the borrower record.
    pub fn apply_to(&self, borrower: &mut Borrower) {
        let text = |value: &Option<String>| present(value).unwrap_or_default().to_string();
        let optional = |value: &Option<String>| present(value).map(str::to_string);

        borrower.first_name = text(&self.first_name);
        borrower.last_name = text(&self.last_name);
        borrower.email = optional(&self.email);
        borrower.phone = optional(&self.phone);
        borrower.date_of_birth = self.date_of_birth;
        borrower.address = Address {
            street: text(&self.street),
            unit: optional(&self.unit),
            city: text(&self.city),
            state: text(&self.state).to_ascii_uppercase(),
            zip: text(&self.zip),
        };
        borrower.employment = Employment {
            status: self.employment_status,
            employer: optional(&self.employer),
            monthly_income: self.monthly_income,
            months_employed: self.months_employed,
        };
        let mut references: [Reference; REFERENCE_SLOTS] = Default::default();
        for (slot, reference) in references.iter_mut().zip(&self.references) {
            *slot = reference.clone();
        }
        borrower.references = references;
        borrower.updated_at = Utc::now();
    }
}
