//! Loan status state machine.
//!
//! Legal moves are listed in [`TRANSITIONS`]; anything not in the table is
//! rejected. Callers pick the event (after validating whatever payload the
//! event needs) and the table decides the resulting status.

use super::envelope::SignerRole;
use super::loan::{Loan, LoanId};
use crate::error::{LoanError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    New,
    ApplicationSent,
    ApplicationInProgress,
    ApplicationCompleted,
    PendingOrgSignature,
    PendingBorrowerSignature,
    PendingIntermediarySignature,
    FullySigned,
    /// Reserved; no transition leads here yet.
    Review,
    /// Reserved; no transition leads here yet.
    Approved,
    Funded,
    Active,
    PendingDerogatoryReview,
    Derogatory,
    Settled,
    Closed,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::New => "new",
            LoanStatus::ApplicationSent => "application_sent",
            LoanStatus::ApplicationInProgress => "application_in_progress",
            LoanStatus::ApplicationCompleted => "application_completed",
            LoanStatus::PendingOrgSignature => "pending_org_signature",
            LoanStatus::PendingBorrowerSignature => "pending_borrower_signature",
            LoanStatus::PendingIntermediarySignature => "pending_intermediary_signature",
            LoanStatus::FullySigned => "fully_signed",
            LoanStatus::Review => "review",
            LoanStatus::Approved => "approved",
            LoanStatus::Funded => "funded",
            LoanStatus::Active => "active",
            LoanStatus::PendingDerogatoryReview => "pending_derogatory_review",
            LoanStatus::Derogatory => "derogatory",
            LoanStatus::Settled => "settled",
            LoanStatus::Closed => "closed",
            LoanStatus::Defaulted => "defaulted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Settled | LoanStatus::Closed | LoanStatus::Defaulted
        )
    }

    pub fn is_awaiting_signature(&self) -> bool {
        matches!(
            self,
            LoanStatus::PendingOrgSignature
                | LoanStatus::PendingBorrowerSignature
                | LoanStatus::PendingIntermediarySignature
        )
    }

    /// Statuses in which scheduled payments are being collected.
    pub fn is_servicing(&self) -> bool {
        matches!(
            self,
            LoanStatus::Active | LoanStatus::PendingDerogatoryReview | LoanStatus::Derogatory
        )
    }

    /// The pending-signature status for a signer role.
    pub fn awaiting(role: SignerRole) -> Self {
        match role {
            SignerRole::Lender => LoanStatus::PendingOrgSignature,
            SignerRole::Borrower => LoanStatus::PendingBorrowerSignature,
            SignerRole::Intermediary => LoanStatus::PendingIntermediarySignature,
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanEvent {
    SendApplication,
    OpenApplication,
    CompleteApplication,
    AwaitLenderSignature,
    AwaitBorrowerSignature,
    AwaitIntermediarySignature,
    CompleteSignatures,
    Fund,
    Activate,
    FlagDelinquency,
    ConfirmDerogatory,
    ClearDelinquency,
    Settle,
    Default,
    Close,
}

impl LoanEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanEvent::SendApplication => "send_application",
            LoanEvent::OpenApplication => "open_application",
            LoanEvent::CompleteApplication => "complete_application",
            LoanEvent::AwaitLenderSignature => "await_lender_signature",
            LoanEvent::AwaitBorrowerSignature => "await_borrower_signature",
            LoanEvent::AwaitIntermediarySignature => "await_intermediary_signature",
            LoanEvent::CompleteSignatures => "complete_signatures",
            LoanEvent::Fund => "fund",
            LoanEvent::Activate => "activate",
            LoanEvent::FlagDelinquency => "flag_delinquency",
            LoanEvent::ConfirmDerogatory => "confirm_derogatory",
            LoanEvent::ClearDelinquency => "clear_delinquency",
            LoanEvent::Settle => "settle",
            LoanEvent::Default => "default",
            LoanEvent::Close => "close",
        }
    }

    /// The event that hands the envelope to the given signer.
    pub fn await_signature(role: SignerRole) -> Self {
        match role {
            SignerRole::Lender => LoanEvent::AwaitLenderSignature,
            SignerRole::Borrower => LoanEvent::AwaitBorrowerSignature,
            SignerRole::Intermediary => LoanEvent::AwaitIntermediarySignature,
        }
    }
}

impl fmt::Display for LoanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who or what caused a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Actor {
    Admin(String),
    Borrower,
    Provider(String),
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Admin(user) => write!(f, "admin:{user}"),
            Actor::Borrower => f.write_str("borrower"),
            Actor::Provider(name) => write!(f, "provider:{name}"),
            Actor::System => f.write_str("system"),
        }
    }
}

/// Audit entry for one applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub loan_id: LoanId,
    pub from: LoanStatus,
    pub to: LoanStatus,
    pub event: LoanEvent,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

use LoanEvent as E;
use LoanStatus as S;

/// Every legal `(from, event) -> to` move.
pub const TRANSITIONS: &[(LoanStatus, LoanEvent, LoanStatus)] = &[
    // application
    (S::New, E::SendApplication, S::ApplicationSent),
    (S::ApplicationSent, E::OpenApplication, S::ApplicationInProgress),
    (S::ApplicationSent, E::CompleteApplication, S::ApplicationCompleted),
    (S::ApplicationInProgress, E::CompleteApplication, S::ApplicationCompleted),
    // signing
    (S::ApplicationCompleted, E::AwaitLenderSignature, S::PendingOrgSignature),
    (S::ApplicationCompleted, E::AwaitBorrowerSignature, S::PendingBorrowerSignature),
    (S::ApplicationCompleted, E::AwaitIntermediarySignature, S::PendingIntermediarySignature),
    (S::PendingOrgSignature, E::AwaitBorrowerSignature, S::PendingBorrowerSignature),
    (S::PendingOrgSignature, E::AwaitIntermediarySignature, S::PendingIntermediarySignature),
    (S::PendingBorrowerSignature, E::AwaitLenderSignature, S::PendingOrgSignature),
    (S::PendingBorrowerSignature, E::AwaitIntermediarySignature, S::PendingIntermediarySignature),
    (S::PendingIntermediarySignature, E::AwaitLenderSignature, S::PendingOrgSignature),
    (S::PendingIntermediarySignature, E::AwaitBorrowerSignature, S::PendingBorrowerSignature),
    (S::PendingOrgSignature, E::CompleteSignatures, S::FullySigned),
    (S::PendingBorrowerSignature, E::CompleteSignatures, S::FullySigned),
    (S::PendingIntermediarySignature, E::CompleteSignatures, S::FullySigned),
    // funding
    (S::FullySigned, E::Fund, S::Funded),
    (S::Funded, E::Activate, S::Active),
    // servicing
    (S::Active, E::FlagDelinquency, S::PendingDerogatoryReview),
    (S::PendingDerogatoryReview, E::ConfirmDerogatory, S::Derogatory),
    (S::PendingDerogatoryReview, E::ClearDelinquency, S::Active),
    (S::Derogatory, E::ClearDelinquency, S::Active),
    (S::Active, E::Settle, S::Settled),
    (S::PendingDerogatoryReview, E::Settle, S::Settled),
    (S::Derogatory, E::Settle, S::Settled),
    (S::Active, E::Default, S::Defaulted),
    (S::PendingDerogatoryReview, E::Default, S::Defaulted),
    (S::Derogatory, E::Default, S::Defaulted),
    // cancellation before funding
    (S::New, E::Close, S::Closed),
    (S::ApplicationSent, E::Close, S::Closed),
    (S::ApplicationInProgress, E::Close, S::Closed),
    (S::ApplicationCompleted, E::Close, S::Closed),
    (S::PendingOrgSignature, E::Close, S::Closed),
    (S::PendingBorrowerSignature, E::Close, S::Closed),
    (S::PendingIntermediarySignature, E::Close, S::Closed),
    (S::FullySigned, E::Close, S::Closed),
];

pub struct LoanStateMachine;

impl LoanStateMachine {
    /// Resolves the status `event` leads to from `from`, without applying it.
    pub fn next(from: LoanStatus, event: LoanEvent) -> Result<LoanStatus> {
        if from.is_terminal() {
            return Err(LoanError::TerminalState { state: from, event });
        }
        TRANSITIONS
            .iter()
            .find(|(state, trigger, _)| *state == from && *trigger == event)
            .map(|(_, _, to)| *to)
            .ok_or(LoanError::IllegalTransition { from, event })
    }

    /// Events accepted from `from`, in table order.
    pub fn allowed_events(from: LoanStatus) -> Vec<LoanEvent> {
        TRANSITIONS
            .iter()
            .filter(|(state, _, _)| *state == from)
            .map(|(_, event, _)| *event)
            .collect()
    }

    /// Applies `event` to the loan and returns the audit record.
    pub fn apply(
        loan: &mut Loan,
        event: LoanEvent,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Result<TransitionRecord> {
        let from = loan.status();
        let to = Self::next(from, event)?;
        loan.set_status(to, at);

        tracing::info!(
            loan_id = %loan.id,
            from = %from,
            to = %to,
            event = %event,
            actor = %actor,
            "Loan status transition"
        );

        Ok(TransitionRecord {
            loan_id: loan.id,
            from,
            to,
            event,
            actor,
            at,
        })
    }
}
