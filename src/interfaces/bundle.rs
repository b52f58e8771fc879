use crate::application::intake::ApplicationForm;
use crate::domain::borrower::Borrower;
use crate::domain::loan::NewLoan;
use crate::domain::organization::Organization;
use crate::error::{FieldError, LoanError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Everything needed to originate one loan, as read from a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanBundle {
    pub organization: Organization,
    pub borrower: Borrower,
    pub loan: NewLoan,
    /// The borrower's application; when absent it is derived from the
    /// borrower record.
    #[serde(default)]
    pub application: Option<ApplicationForm>,
}

impl LoanBundle {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let bundle: LoanBundle = serde_json::from_reader(source)?;
        if bundle.borrower.organization_id != bundle.organization.id {
            return Err(LoanError::Validation(vec![FieldError::new(
                "borrower.organization_id",
                "does not match organization.id",
            )]));
        }
        Ok(bundle)
    }

    pub fn application(&self) -> ApplicationForm {
        self.application
            .clone()
            .unwrap_or_else(|| ApplicationForm::from(&self.borrower))
    }
}
