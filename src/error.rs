use crate::domain::state_machine::{LoanEvent, LoanStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single failing input field, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failure modes of the e-signature collaborator.
///
/// The two variants have different recovery paths: an unreachable provider can
/// be retried with a fresh request, a rejection needs the data corrected first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Signature provider unreachable: {0}")]
    Unreachable(String),
    #[error("Signature provider rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },
}

impl EnvelopeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnvelopeError::Unreachable(_))
    }
}

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("Invalid invitation recipient: {0}")]
    InvalidRecipient(String),

    #[error("Illegal transition: {event} is not allowed from {from}")]
    IllegalTransition { from: LoanStatus, event: LoanEvent },
    #[error("Loan is in terminal state {state}; {event} rejected")]
    TerminalState { state: LoanStatus, event: LoanEvent },
    #[error("Operation {operation} is not allowed while the loan is {state}")]
    InvalidState {
        state: LoanStatus,
        operation: &'static str,
    },
    #[error("Borrower {0} has not completed identity verification")]
    VerificationRequired(uuid::Uuid),
    #[error("Feature disabled for organization: {0}")]
    FeatureDisabled(&'static str),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("Invalid term: {0} periods")]
    InvalidTerm(u32),
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(Decimal),
    #[error("Invalid rate: {0}")]
    InvalidRate(Decimal),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl LoanError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LoanError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, LoanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_field() {
        let err = LoanError::Validation(vec![
            FieldError::new("email", "is required"),
            FieldError::new("employment.status", "is required"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: email: is required; employment.status: is required"
        );
    }

    #[test]
    fn test_envelope_error_retryability() {
        assert!(EnvelopeError::Unreachable("timeout".into()).is_retryable());
        assert!(
            !EnvelopeError::Rejected {
                code: "INVALID_EMAIL".into(),
                message: "bad".into()
            }
            .is_retryable()
        );
    }
}
