use crate::domain::borrower::Borrower;
use crate::domain::loan::{BorrowerId, Loan, LoanId, OrganizationId};
use crate::domain::organization::Organization;
use crate::domain::ports::{
    BorrowerStore, LoanStore, OrganizationStore, ScheduleStore, Stores, TransitionLog,
    VerificationStore,
};
use crate::domain::schedule::PaymentScheduleEntry;
use crate::domain::state_machine::TransitionRecord;
use crate::domain::verification::{Verification, VerificationId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for loans.
///
/// Clones share the same map.
#[derive(Default, Clone)]
pub struct InMemoryLoanStore {
    loans: Arc<RwLock<HashMap<LoanId, Loan>>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn store(&self, loan: Loan) -> Result<()> {
        let mut loans = self.loans.write().await;
        loans.insert(loan.id, loan);
        Ok(())
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        let loans = self.loans.read().await;
        Ok(loans.get(&id).cloned())
    }

    async fn for_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>> {
        let loans = self.loans.read().await;
        let mut owned: Vec<Loan> = loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id)
            .cloned()
            .collect();
        owned.sort_by_key(|loan| loan.created_at);
        Ok(owned)
    }

    async fn find_by_envelope(&self, envelope_id: &str) -> Result<Option<Loan>> {
        let loans = self.loans.read().await;
        Ok(loans
            .values()
            .find(|loan| {
                loan.envelope
                    .as_ref()
                    .is_some_and(|envelope| envelope.envelope_id == envelope_id)
            })
            .cloned())
    }

    async fn delete(&self, id: LoanId) -> Result<()> {
        self.loans.write().await.remove(&id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryBorrowerStore {
    borrowers: Arc<RwLock<HashMap<BorrowerId, Borrower>>>,
}

impl InMemoryBorrowerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BorrowerStore for InMemoryBorrowerStore {
    async fn store(&self, borrower: Borrower) -> Result<()> {
        let mut borrowers = self.borrowers.write().await;
        borrowers.insert(borrower.id, borrower);
        Ok(())
    }

    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>> {
        let borrowers = self.borrowers.read().await;
        Ok(borrowers.get(&id).cloned())
    }

    async fn delete(&self, id: BorrowerId) -> Result<()> {
        self.borrowers.write().await.remove(&id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOrganizationStore {
    organizations: Arc<RwLock<HashMap<OrganizationId, Organization>>>,
}

impl InMemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrganizationStore for InMemoryOrganizationStore {
    async fn store(&self, organization: Organization) -> Result<()> {
        let mut organizations = self.organizations.write().await;
        organizations.insert(organization.id, organization);
        Ok(())
    }

    async fn get(&self, id: OrganizationId) -> Result<Option<Organization>> {
        let organizations = self.organizations.read().await;
        Ok(organizations.get(&id).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryScheduleStore {
    schedules: Arc<RwLock<HashMap<LoanId, Vec<PaymentScheduleEntry>>>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn store(&self, loan_id: LoanId, entries: Vec<PaymentScheduleEntry>) -> Result<()> {
        let mut schedules = self.schedules.write().await;
        schedules.insert(loan_id, entries);
        Ok(())
    }

    async fn get(&self, loan_id: LoanId) -> Result<Option<Vec<PaymentScheduleEntry>>> {
        let schedules = self.schedules.read().await;
        Ok(schedules.get(&loan_id).cloned())
    }

    async fn delete(&self, loan_id: LoanId) -> Result<()> {
        self.schedules.write().await.remove(&loan_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryVerificationStore {
    verifications: Arc<RwLock<HashMap<VerificationId, Verification>>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VerificationStore for InMemoryVerificationStore {
    async fn store(&self, verification: Verification) -> Result<()> {
        let mut verifications = self.verifications.write().await;
        verifications.insert(verification.id, verification);
        Ok(())
    }

    async fn get(&self, id: VerificationId) -> Result<Option<Verification>> {
        let verifications = self.verifications.read().await;
        Ok(verifications.get(&id).cloned())
    }
}

/// Append-only transition log kept in insertion order.
#[derive(Default, Clone)]
pub struct InMemoryTransitionLog {
    records: Arc<RwLock<Vec<TransitionRecord>>>,
}

impl InMemoryTransitionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransitionLog for InMemoryTransitionLog {
    async fn append(&self, record: TransitionRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn history(&self, loan_id: LoanId) -> Result<Vec<TransitionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| record.loan_id == loan_id)
            .cloned()
            .collect())
    }
}

impl Stores {
    /// Every port backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self {
            loans: Box::new(InMemoryLoanStore::new()),
            borrowers: Box::new(InMemoryBorrowerStore::new()),
            organizations: Box::new(InMemoryOrganizationStore::new()),
            schedules: Box::new(InMemoryScheduleStore::new()),
            verifications: Box::new(InMemoryVerificationStore::new()),
            transitions: Box::new(InMemoryTransitionLog::new()),
        }
    }
}
