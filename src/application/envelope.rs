use super::fields::FieldSynthesizer;
use crate::domain::borrower::Borrower;
use crate::domain::envelope::{
    EnvelopeRef, EnvelopeRequest, EnvelopeStatus, Field, SignerRole, SigningParty,
};
use crate::domain::loan::{Loan, ProviderFailureKind, ProviderStatus};
use crate::domain::organization::Organization;
use crate::domain::ports::SignatureProviderBox;
use crate::domain::schedule::PaymentScheduleEntry;
use crate::domain::state_machine::{Actor, LoanEvent, LoanStateMachine, LoanStatus, TransitionRecord};
use crate::error::{EnvelopeError, LoanError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const LENDER_ROUTING_ORDER: u32 = 1;
pub const BORROWER_ROUTING_ORDER: u32 = 2;
pub const INTERMEDIARY_ROUTING_ORDER: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    pub name: String,
    pub email: String,
}

/// Template and routing settings for outgoing envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSettings {
    pub template_id: String,
    pub email_subject: String,
    /// Optional third signer, routed after the borrower.
    pub intermediary: Option<SignerIdentity>,
}

/// A signing request the provider accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub envelope_id: String,
    pub accepted_at: DateTime<Utc>,
    pub transition: TransitionRecord,
}

/// Builds the signing request for a loan and hands it to the provider.
pub struct EnvelopeOrchestrator {
    synthesizer: FieldSynthesizer,
    settings: EnvelopeSettings,
    provider: SignatureProviderBox,
}

impl EnvelopeOrchestrator {
    pub fn new(
        synthesizer: FieldSynthesizer,
        settings: EnvelopeSettings,
        provider: SignatureProviderBox,
    ) -> Self {
        Self {
            synthesizer,
            settings,
            provider,
        }
    }

    pub fn synthesizer(&self) -> &FieldSynthesizer {
        &self.synthesizer
    }

    pub fn build_request(
        &self,
        loan: &Loan,
        borrower: &Borrower,
        organization: &Organization,
        schedule: &[PaymentScheduleEntry],
        today: NaiveDate,
    ) -> Result<EnvelopeRequest> {
        let fields = self
            .synthesizer
            .synthesize(loan, borrower, organization, schedule, today)?;
        let borrower_email = borrower
            .email()
            .ok_or(LoanError::MissingRequiredField("borrower.email"))?;

        let mut parties = vec![
            SigningParty {
                role: SignerRole::Lender,
                recipient_order: LENDER_ROUTING_ORDER,
                email: organization.contact_email.clone(),
                name: organization.contact_name.clone(),
                fields: fields.lender,
            },
            SigningParty {
                role: SignerRole::Borrower,
                recipient_order: BORROWER_ROUTING_ORDER,
                email: borrower_email.to_string(),
                name: borrower.full_name(),
                fields: fields.borrower,
            },
        ];
        if let Some(intermediary) = &self.settings.intermediary {
            parties.push(SigningParty {
                role: SignerRole::Intermediary,
                recipient_order: INTERMEDIARY_ROUTING_ORDER,
                email: intermediary.email.clone(),
                name: intermediary.name.clone(),
                fields: Vec::<Field>::new(),
            });
        }

        Ok(EnvelopeRequest {
            template_id: self.settings.template_id.clone(),
            email_subject: self.settings.email_subject.clone(),
            parties,
            status: EnvelopeStatus::Sent,
        })
    }

    /// Submits the loan's contract for signature.
    ///
    /// The loan must be `application_completed`. On success the envelope
    /// reference is stored on the loan and the status moves to the first
    /// signer's pending state. On a provider failure the status is left as is
    /// and only the provider annotation records what went wrong; the caller
    /// is expected to persist the loan either way.
    pub async fn submit(
        &self,
        loan: &mut Loan,
        borrower: &Borrower,
        organization: &Organization,
        schedule: &[PaymentScheduleEntry],
        today: NaiveDate,
        actor: Actor,
    ) -> Result<Submission> {
        if loan.status() != LoanStatus::ApplicationCompleted {
            return Err(LoanError::InvalidState {
                state: loan.status(),
                operation: "submit_envelope",
            });
        }

        let request = self.build_request(loan, borrower, organization, schedule, today)?;
        let first = request
            .first_signer()
            .map(|party| party.role)
            .ok_or(LoanError::MissingRequiredField("envelope.parties"))?;
        let event = LoanEvent::await_signature(first);
        LoanStateMachine::next(loan.status(), event)?;

        match self.provider.create_envelope(&request).await {
            Ok(receipt) => {
                let envelope = EnvelopeRef::from_request(&receipt, &request);
                let accepted_at = envelope.accepted_at;
                loan.envelope = Some(envelope);
                loan.provider_status = Some(ProviderStatus::Sent);
                let transition = LoanStateMachine::apply(loan, event, actor, Utc::now())?;

                Ok(Submission {
                    envelope_id: receipt.envelope_id,
                    accepted_at,
                    transition,
                })
            }
            Err(error) => {
                let kind = match error {
                    EnvelopeError::Unreachable(_) => ProviderFailureKind::Unreachable,
                    EnvelopeError::Rejected { .. } => ProviderFailureKind::Rejected,
                };
                tracing::warn!(
                    loan_id = %loan.id,
                    retryable = error.is_retryable(),
                    error = %error,
                    "Envelope submission failed"
                );
                loan.provider_status = Some(ProviderStatus::Failed {
                    kind,
                    detail: error.to_string(),
                    at: Utc::now(),
                });
                Err(LoanError::Envelope(error))
            }
        }
    }
}
