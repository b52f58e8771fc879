use super::borrower::Borrower;
use super::envelope::{EnvelopeReceipt, EnvelopeRequest};
use super::loan::{BorrowerId, Loan, LoanId, OrganizationId};
use super::organization::Organization;
use super::schedule::PaymentScheduleEntry;
use super::state_machine::TransitionRecord;
use super::verification::{Verification, VerificationId};
use crate::error::{EnvelopeError, Result};
use async_trait::async_trait;

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn store(&self, loan: Loan) -> Result<()>;
    async fn get(&self, id: LoanId) -> Result<Option<Loan>>;
    async fn for_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>>;
    async fn find_by_envelope(&self, envelope_id: &str) -> Result<Option<Loan>>;
    async fn delete(&self, id: LoanId) -> Result<()>;
}

#[async_trait]
pub trait BorrowerStore: Send + Sync {
    async fn store(&self, borrower: Borrower) -> Result<()>;
    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>>;
    async fn delete(&self, id: BorrowerId) -> Result<()>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn store(&self, organization: Organization) -> Result<()>;
    async fn get(&self, id: OrganizationId) -> Result<Option<Organization>>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn store(&self, loan_id: LoanId, entries: Vec<PaymentScheduleEntry>) -> Result<()>;
    async fn get(&self, loan_id: LoanId) -> Result<Option<Vec<PaymentScheduleEntry>>>;
    async fn delete(&self, loan_id: LoanId) -> Result<()>;
}

#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn store(&self, verification: Verification) -> Result<()>;
    async fn get(&self, id: VerificationId) -> Result<Option<Verification>>;
}

/// Append-only audit trail of status transitions.
#[async_trait]
pub trait TransitionLog: Send + Sync {
    async fn append(&self, record: TransitionRecord) -> Result<()>;
    async fn history(&self, loan_id: LoanId) -> Result<Vec<TransitionRecord>>;
}

/// The e-signature collaborator. One call per submission, no retries.
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    async fn create_envelope(
        &self,
        request: &EnvelopeRequest,
    ) -> std::result::Result<EnvelopeReceipt, EnvelopeError>;
}

pub type LoanStoreBox = Box<dyn LoanStore>;
pub type BorrowerStoreBox = Box<dyn BorrowerStore>;
pub type OrganizationStoreBox = Box<dyn OrganizationStore>;
pub type ScheduleStoreBox = Box<dyn ScheduleStore>;
pub type VerificationStoreBox = Box<dyn VerificationStore>;
pub type TransitionLogBox = Box<dyn TransitionLog>;
pub type SignatureProviderBox = Box<dyn SignatureProvider>;

/// Every storage port the lifecycle service needs.
pub struct Stores {
    pub loans: LoanStoreBox,
    pub borrowers: BorrowerStoreBox,
    pub organizations: OrganizationStoreBox,
    pub schedules: ScheduleStoreBox,
    pub verifications: VerificationStoreBox,
    pub transitions: TransitionLogBox,
}
