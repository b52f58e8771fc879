use crate::domain::loan::LoanId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type LoanMutex = Arc<tokio::sync::Mutex<()>>;

/// One mutex per loan.
///
/// Holding the guard serializes every read-modify-write of that loan, while
/// operations on different loans run concurrently. An entry lives only as long
/// as someone holds or waits for it.
#[derive(Default)]
pub struct LoanLocks {
    locks: Mutex<HashMap<LoanId, LoanMutex>>,
}

/// Exclusive access to one loan. Dropping it releases the loan and prunes its
/// registry entry once nobody else is queued on it.
pub struct LoanGuard<'a> {
    registry: &'a LoanLocks,
    id: LoanId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: LoanId) -> LoanGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };
        LoanGuard {
            registry: self,
            id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Loans that currently have a holder or a waiter.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, id: LoanId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // clones are only taken under the registry lock, so a count of one
        // means no task holds or awaits this loan
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }
}

impl Drop for LoanGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.release(self.id);
    }
}
