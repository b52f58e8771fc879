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
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub const CF_LOANS: &str = "loans";
pub const CF_BORROWERS: &str = "borrowers";
pub const CF_ORGANIZATIONS: &str = "organizations";
pub const CF_SCHEDULES: &str = "schedules";
pub const CF_VERIFICATIONS: &str = "verifications";
/// One JSON array of transition records per loan.
pub const CF_TRANSITIONS: &str = "transitions";

const COLUMN_FAMILIES: [&str; 6] = [
    CF_LOANS,
    CF_BORROWERS,
    CF_ORGANIZATIONS,
    CF_SCHEDULES,
    CF_VERIFICATIONS,
    CF_TRANSITIONS,
];

/// A persistent store backed by RocksDB, one column family per entity.
///
/// Values are JSON, keys are the entity's UUID bytes. `Clone` shares the
/// underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a database at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Every port served by this one database.
    pub fn into_stores(self) -> Stores {
        Stores {
            loans: Box::new(self.clone()),
            borrowers: Box::new(self.clone()),
            organizations: Box::new(self.clone()),
            schedules: Box::new(self.clone()),
            verifications: Box::new(self.clone()),
            transitions: Box::new(self),
        }
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: Uuid, value: &T) -> Result<()> {
        let cf = self.handle(cf_name)?;
        self.db.put_cf(&cf, key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &str, key: Uuid) -> Result<Option<T>> {
        let cf = self.handle(cf_name)?;
        match self.db.get_pinned_cf(&cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, cf_name: &str, key: Uuid) -> Result<()> {
        let cf = self.handle(cf_name)?;
        self.db.delete_cf(&cf, key.as_bytes())?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.handle(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn handle(&self, cf_name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(cf_name).ok_or_else(|| {
            LoanError::Internal(Box::new(std::io::Error::other(format!(
                "{cf_name} column family not found"
            ))))
        })
    }
}

#[async_trait]
impl LoanStore for RocksDBStore {
    async fn store(&self, loan: Loan) -> Result<()> {
        self.put(CF_LOANS, loan.id, &loan)
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        self.fetch(CF_LOANS, id)
    }

    async fn for_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .scan::<Loan>(CF_LOANS)?
            .into_iter()
            .filter(|loan| loan.borrower_id == borrower_id)
            .collect();
        loans.sort_by_key(|loan| loan.created_at);
        Ok(loans)
    }

    async fn find_by_envelope(&self, envelope_id: &str) -> Result<Option<Loan>> {
        Ok(self.scan::<Loan>(CF_LOANS)?.into_iter().find(|loan| {
            loan.envelope
                .as_ref()
                .is_some_and(|envelope| envelope.envelope_id == envelope_id)
        }))
    }

    async fn delete(&self, id: LoanId) -> Result<()> {
        self.remove(CF_LOANS, id)
    }
}

#[async_trait]
impl BorrowerStore for RocksDBStore {
    async fn store(&self, borrower: Borrower) -> Result<()> {
        self.put(CF_BORROWERS, borrower.id, &borrower)
    }

    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>> {
        self.fetch(CF_BORROWERS, id)
    }

    async fn delete(&self, id: BorrowerId) -> Result<()> {
        self.remove(CF_BORROWERS, id)
    }
}

#[async_trait]
impl OrganizationStore for RocksDBStore {
    async fn store(&self, organization: Organization) -> Result<()> {
        self.put(CF_ORGANIZATIONS, organization.id, &organization)
    }

    async fn get(&self, id: OrganizationId) -> Result<Option<Organization>> {
        self.fetch(CF_ORGANIZATIONS, id)
    }
}

#[async_trait]
impl ScheduleStore for RocksDBStore {
    async fn store(&self, loan_id: LoanId, entries: Vec<PaymentScheduleEntry>) -> Result<()> {
        self.put(CF_SCHEDULES, loan_id, &entries)
    }

    async fn get(&self, loan_id: LoanId) -> Result<Option<Vec<PaymentScheduleEntry>>> {
        self.fetch(CF_SCHEDULES, loan_id)
    }

    async fn delete(&self, loan_id: LoanId) -> Result<()> {
        self.remove(CF_SCHEDULES, loan_id)
    }
}

#[async_trait]
impl VerificationStore for RocksDBStore {
    async fn store(&self, verification: Verification) -> Result<()> {
        self.put(CF_VERIFICATIONS, verification.id, &verification)
    }

    async fn get(&self, id: VerificationId) -> Result<Option<Verification>> {
        self.fetch(CF_VERIFICATIONS, id)
    }
}

#[async_trait]
impl TransitionLog for RocksDBStore {
    // Appends for one loan are serialized by the caller's loan lock.
    async fn append(&self, record: TransitionRecord) -> Result<()> {
        let mut history: Vec<TransitionRecord> = self
            .fetch(CF_TRANSITIONS, record.loan_id)?
            .unwrap_or_default();
        let loan_id = record.loan_id;
        history.push(record);
        self.put(CF_TRANSITIONS, loan_id, &history)
    }

    async fn history(&self, loan_id: LoanId) -> Result<Vec<TransitionRecord>> {
        Ok(self.fetch(CF_TRANSITIONS, loan_id)?.unwrap_or_default())
    }
}
