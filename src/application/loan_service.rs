use super::envelope::{EnvelopeOrchestrator, Submission};
use super::intake::{ApplicationForm, is_email};
use super::locks::LoanLocks;
use crate::domain::amortization;
use crate::domain::borrower::{Borrower, BorrowerVerification};
use crate::domain::envelope::SignerRole;
use crate::domain::loan::{BorrowerId, Loan, LoanId, NewLoan, OrganizationId, ProviderStatus};
use crate::domain::organization::Organization;
use crate::domain::ports::Stores;
use crate::domain::schedule::PaymentScheduleEntry;
use crate::domain::state_machine::{
    Actor, LoanEvent, LoanStateMachine, LoanStatus, TransitionRecord,
};
use crate::domain::verification::{Verification, VerificationId, VerificationStatus};
use crate::error::{FieldError, LoanError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of a settlement attempt reported by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid { amount: Decimal, on: NaiveDate },
    Failed { on: NaiveDate },
}

/// What a delinquency sweep changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverdueSweep {
    pub flagged: Vec<u32>,
    pub transition: Option<TransitionRecord>,
}

/// Drives loans through their lifecycle.
///
/// Every operation that touches a loan holds that loan's lock for its whole
/// read-modify-write, persists the loan and appends each applied transition to
/// the transition log.
pub struct LoanService {
    stores: Stores,
    orchestrator: EnvelopeOrchestrator,
    locks: LoanLocks,
}

impl LoanService {
    pub fn new(stores: Stores, orchestrator: EnvelopeOrchestrator) -> Self {
        Self {
            stores,
            orchestrator,
            locks: LoanLocks::new(),
        }
    }

    pub fn orchestrator(&self) -> &EnvelopeOrchestrator {
        &self.orchestrator
    }

    pub async fn register_organization(&self, organization: Organization) -> Result<()> {
        self.stores.organizations.store(organization).await
    }

    pub async fn register_borrower(&self, borrower: Borrower) -> Result<()> {
        self.organization(borrower.organization_id).await?;
        self.stores.borrowers.store(borrower).await
    }

    pub async fn organization(&self, id: OrganizationId) -> Result<Organization> {
        self.stores
            .organizations
            .get(id)
            .await?
            .ok_or_else(|| LoanError::not_found("organization", id))
    }

    pub async fn borrower(&self, id: BorrowerId) -> Result<Borrower> {
        self.stores
            .borrowers
            .get(id)
            .await?
            .ok_or_else(|| LoanError::not_found("borrower", id))
    }

    pub async fn loan(&self, id: LoanId) -> Result<Loan> {
        self.stores
            .loans
            .get(id)
            .await?
            .ok_or_else(|| LoanError::not_found("loan", id))
    }

    /// The stored schedule, if one has been generated.
    pub async fn schedule(&self, loan_id: LoanId) -> Result<Option<Vec<PaymentScheduleEntry>>> {
        self.stores.schedules.get(loan_id).await
    }

    pub async fn history(&self, loan_id: LoanId) -> Result<Vec<TransitionRecord>> {
        self.stores.transitions.history(loan_id).await
    }

    /// Starts a loan in `new` for a borrower of the organization.
    pub async fn create_loan(
        &self,
        organization_id: OrganizationId,
        borrower_id: BorrowerId,
        request: NewLoan,
    ) -> Result<Loan> {
        let organization = self.organization(organization_id).await?;
        if !organization.features.loan_origination {
            return Err(LoanError::FeatureDisabled("loan_origination"));
        }
        let borrower = self.borrower(borrower_id).await?;
        if borrower.organization_id != organization_id {
            return Err(LoanError::Validation(vec![FieldError::new(
                "borrower_id",
                "belongs to another organization",
            )]));
        }

        let loan = Loan::new(request, organization_id, borrower_id, Utc::now())?;
        self.stores.loans.store(loan.clone()).await?;
        tracing::info!(
            loan_id = %loan.id,
            borrower_id = %borrower_id,
            principal = %loan.principal,
            payment = %loan.payment,
            "Loan created"
        );
        Ok(loan)
    }

    /// Removes a borrower together with every loan and schedule they own.
    pub async fn delete_borrower(&self, borrower_id: BorrowerId) -> Result<()> {
        self.borrower(borrower_id).await?;
        for loan in self.stores.loans.for_borrower(borrower_id).await? {
            let _guard = self.locks.acquire(loan.id).await;
            self.stores.schedules.delete(loan.id).await?;
            self.stores.loans.delete(loan.id).await?;
            tracing::info!(loan_id = %loan.id, "Loan removed with its borrower");
        }
        self.stores.borrowers.delete(borrower_id).await
    }

    /// Invites the borrower to fill in the online application.
    pub async fn send_application(&self, loan_id: LoanId, actor: Actor) -> Result<TransitionRecord> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        let borrower = self.borrower(loan.borrower_id).await?;

        LoanStateMachine::next(loan.status(), LoanEvent::SendApplication)?;
        match borrower.email() {
            Some(email) if is_email(email) => {}
            Some(email) => return Err(LoanError::InvalidRecipient(email.to_string())),
            None => {
                return Err(LoanError::InvalidRecipient(format!(
                    "borrower {} has no email address",
                    borrower.id
                )));
            }
        }

        self.commit(&mut loan, LoanEvent::SendApplication, actor)
            .await
    }

    pub async fn open_application(&self, loan_id: LoanId) -> Result<TransitionRecord> {
        self.transition(loan_id, LoanEvent::OpenApplication, Actor::Borrower)
            .await
    }

    /// Accepts the borrower's application once every field validates.
    pub async fn complete_application(
        &self,
        loan_id: LoanId,
        form: &ApplicationForm,
        today: NaiveDate,
    ) -> Result<TransitionRecord> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        LoanStateMachine::next(loan.status(), LoanEvent::CompleteApplication)?;
        form.validate(today)?;

        let mut borrower = self.borrower(loan.borrower_id).await?;
        form.apply_to(&mut borrower);
        self.stores.borrowers.store(borrower).await?;

        self.commit(&mut loan, LoanEvent::CompleteApplication, Actor::Borrower)
            .await
    }

    /// Generates the schedule (once) and sends the contract out for signature.
    ///
    /// A provider failure leaves the status at `application_completed` with
    /// the failure recorded on the loan; the error is still returned.
    pub async fn submit_envelope(
        &self,
        loan_id: LoanId,
        today: NaiveDate,
        actor: Actor,
    ) -> Result<Submission> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        let borrower = self.borrower(loan.borrower_id).await?;
        let organization = self.organization(loan.organization_id).await?;

        if organization.features.require_verified_borrower && !borrower.is_verified() {
            return Err(LoanError::VerificationRequired(borrower.id));
        }
        if loan.status() != LoanStatus::ApplicationCompleted {
            return Err(LoanError::InvalidState {
                state: loan.status(),
                operation: "submit_envelope",
            });
        }

        let schedule = match self.stores.schedules.get(loan_id).await? {
            Some(existing) => existing,
            None => {
                let generated = amortization::schedule(
                    loan.principal,
                    loan.periodic_rate()?,
                    loan.periods,
                    today,
                    loan.frequency.period_days(),
                )?;
                self.stores
                    .schedules
                    .store(loan_id, generated.clone())
                    .await?;
                generated
            }
        };

        let result = self
            .orchestrator
            .submit(&mut loan, &borrower, &organization, &schedule, today, actor)
            .await;
        match result {
            Ok(submission) => {
                self.stores.loans.store(loan).await?;
                self.stores
                    .transitions
                    .append(submission.transition.clone())
                    .await?;
                Ok(submission)
            }
            Err(error @ LoanError::Envelope(_)) => {
                self.stores.loans.store(loan).await?;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Handles a "recipient signed" callback from the signature provider.
    ///
    /// Callbacks may arrive in any order and more than once; a repeated
    /// callback returns `Ok(None)` and changes nothing.
    pub async fn record_signature(
        &self,
        envelope_id: &str,
        role: SignerRole,
        at: DateTime<Utc>,
    ) -> Result<Option<TransitionRecord>> {
        let loan_id = self
            .stores
            .loans
            .find_by_envelope(envelope_id)
            .await?
            .map(|loan| loan.id)
            .ok_or_else(|| LoanError::not_found("envelope", envelope_id))?;

        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        let status = loan.status();
        let envelope = loan
            .envelope
            .as_mut()
            .ok_or_else(|| LoanError::not_found("envelope", envelope_id))?;

        if !envelope.is_required(role) {
            return Err(LoanError::Validation(vec![FieldError::new(
                "role",
                format!("{role} is not a signer on envelope {envelope_id}"),
            )]));
        }
        if envelope.has_signed(role) {
            tracing::debug!(loan_id = %loan_id, role = %role, "Duplicate signature callback");
            return Ok(None);
        }
        if !status.is_awaiting_signature() {
            return Err(LoanError::InvalidState {
                state: status,
                operation: "record_signature",
            });
        }

        envelope.record_signature(role, at);
        let next = if envelope.all_signed() {
            Some(LoanEvent::CompleteSignatures)
        } else {
            envelope
                .next_unsigned()
                .filter(|waiting| LoanStatus::awaiting(*waiting) != status)
                .map(LoanEvent::await_signature)
        };
        tracing::info!(loan_id = %loan_id, role = %role, "Signature recorded");

        let actor = Actor::Provider("esign".to_string());
        match next {
            Some(event) => {
                if event == LoanEvent::CompleteSignatures {
                    loan.provider_status = Some(ProviderStatus::Completed);
                }
                self.commit(&mut loan, event, actor).await.map(Some)
            }
            None => {
                self.stores.loans.store(loan).await?;
                Ok(None)
            }
        }
    }

    pub async fn fund_loan(&self, loan_id: LoanId, actor: Actor) -> Result<TransitionRecord> {
        self.transition(loan_id, LoanEvent::Fund, actor).await
    }

    pub async fn activate_loan(&self, loan_id: LoanId, actor: Actor) -> Result<TransitionRecord> {
        self.transition(loan_id, LoanEvent::Activate, actor).await
    }

    /// Settles or fails one scheduled payment.
    ///
    /// A failed charge that leaves a pending entry overdue on an `active` loan
    /// sends it to derogatory review; the last outstanding payment settles the
    /// loan. Failing an entry that is already paid is rejected.
    pub async fn record_payment(
        &self,
        loan_id: LoanId,
        sequence: u32,
        outcome: PaymentOutcome,
    ) -> Result<Option<TransitionRecord>> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        if !loan.status().is_servicing() {
            return Err(LoanError::InvalidState {
                state: loan.status(),
                operation: "record_payment",
            });
        }

        let mut schedule = self
            .stores
            .schedules
            .get(loan_id)
            .await?
            .ok_or_else(|| LoanError::not_found("schedule", loan_id))?;
        let entry = schedule
            .iter_mut()
            .find(|entry| entry.sequence == sequence)
            .ok_or_else(|| LoanError::not_found("schedule entry", sequence))?;

        let event = match outcome {
            PaymentOutcome::Paid { amount, on } => {
                entry.mark_paid(amount, on)?;
                tracing::info!(loan_id = %loan_id, sequence, amount = %amount, "Payment settled");
                schedule
                    .iter()
                    .all(PaymentScheduleEntry::is_paid)
                    .then_some(LoanEvent::Settle)
            }
            PaymentOutcome::Failed { on } => {
                let newly_overdue = entry.mark_failed()?;
                tracing::warn!(loan_id = %loan_id, sequence, on = %on, "Payment failed");
                (newly_overdue && loan.status() == LoanStatus::Active)
                    .then_some(LoanEvent::FlagDelinquency)
            }
        };
        self.stores.schedules.store(loan_id, schedule).await?;

        match event {
            Some(event) => self.commit(&mut loan, event, Actor::System).await.map(Some),
            None => Ok(None),
        }
    }

    /// Flags every pending entry due before `today` as overdue.
    pub async fn mark_overdue(&self, loan_id: LoanId, today: NaiveDate) -> Result<OverdueSweep> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        if !loan.status().is_servicing() {
            return Err(LoanError::InvalidState {
                state: loan.status(),
                operation: "mark_overdue",
            });
        }
        let Some(mut schedule) = self.stores.schedules.get(loan_id).await? else {
            return Ok(OverdueSweep::default());
        };

        let flagged: Vec<u32> = schedule
            .iter_mut()
            .filter(|entry| entry.due_date < today)
            .filter_map(|entry| entry.mark_overdue().then_some(entry.sequence))
            .collect();
        if flagged.is_empty() {
            return Ok(OverdueSweep::default());
        }
        self.stores.schedules.store(loan_id, schedule).await?;
        tracing::warn!(loan_id = %loan_id, count = flagged.len(), "Payments overdue");

        let transition = if loan.status() == LoanStatus::Active {
            Some(
                self.commit(&mut loan, LoanEvent::FlagDelinquency, Actor::System)
                    .await?,
            )
        } else {
            None
        };
        Ok(OverdueSweep {
            flagged,
            transition,
        })
    }

    /// Outcome of a derogatory review: confirm, or clear back to `active`.
    pub async fn resolve_delinquency(
        &self,
        loan_id: LoanId,
        confirm: bool,
        actor: Actor,
    ) -> Result<TransitionRecord> {
        let event = if confirm {
            LoanEvent::ConfirmDerogatory
        } else {
            LoanEvent::ClearDelinquency
        };
        self.transition(loan_id, event, actor).await
    }

    pub async fn default_loan(&self, loan_id: LoanId, actor: Actor) -> Result<TransitionRecord> {
        self.transition(loan_id, LoanEvent::Default, actor).await
    }

    pub async fn close_loan(&self, loan_id: LoanId, actor: Actor) -> Result<TransitionRecord> {
        self.transition(loan_id, LoanEvent::Close, actor).await
    }

    pub async fn register_verification(&self, verification: Verification) -> Result<()> {
        self.organization(verification.organization_id).await?;
        if let Some(borrower_id) = verification.borrower_id {
            self.borrower(borrower_id).await?;
        }
        self.stores.verifications.store(verification).await
    }

    /// Moves an identity check forward and mirrors the result onto the linked
    /// borrower, if any.
    pub async fn update_verification(
        &self,
        id: VerificationId,
        status: VerificationStatus,
        at: DateTime<Utc>,
    ) -> Result<Verification> {
        let mut verification = self
            .stores
            .verifications
            .get(id)
            .await?
            .ok_or_else(|| LoanError::not_found("verification", id))?;
        verification.advance(status, at)?;
        self.stores.verifications.store(verification.clone()).await?;

        if let Some(borrower_id) = verification.borrower_id {
            let mut borrower = self.borrower(borrower_id).await?;
            borrower.verification = match status {
                VerificationStatus::Completed => BorrowerVerification::Verified,
                VerificationStatus::Failed | VerificationStatus::Expired => {
                    BorrowerVerification::Failed
                }
                _ => BorrowerVerification::Pending,
            };
            borrower.updated_at = at;
            self.stores.borrowers.store(borrower).await?;
        }
        tracing::info!(verification_id = %id, status = ?status, "Verification updated");
        Ok(verification)
    }

    async fn transition(
        &self,
        loan_id: LoanId,
        event: LoanEvent,
        actor: Actor,
    ) -> Result<TransitionRecord> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        self.commit(&mut loan, event, actor).await
    }

    /// Applies `event`, then persists the loan and the audit record. Callers
    /// hold the loan's lock.
    async fn commit(
        &self,
        loan: &mut Loan,
        event: LoanEvent,
        actor: Actor,
    ) -> Result<TransitionRecord> {
        let record = LoanStateMachine::apply(loan, event, actor, Utc::now())?;
        self.stores.loans.store(loan.clone()).await?;
        self.stores.transitions.append(record.clone()).await?;
        Ok(record)
    }
}
