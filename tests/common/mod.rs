#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use loanflow::application::envelope::{EnvelopeOrchestrator, EnvelopeSettings, SignerIdentity};
use loanflow::application::fields::{FieldSynthesizer, LenderIdentity};
use loanflow::application::intake::ApplicationForm;
use loanflow::application::loan_service::LoanService;
use loanflow::domain::borrower::{BorrowerVerification, Reference};
use loanflow::domain::envelope::{EnvelopeReceipt, EnvelopeRequest};
use loanflow::domain::loan::Loan;
use loanflow::domain::ports::{SignatureProvider, SignatureProviderBox, Stores};
use loanflow::error::EnvelopeError;
use loanflow::infrastructure::esign::DryRunSignatureProvider;
use loanflow::interfaces::bundle::LoanBundle;
use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const BUNDLE: &str = "tests/fixtures/loan_bundle.json";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn bundle() -> LoanBundle {
    LoanBundle::from_reader(File::open(BUNDLE).unwrap()).unwrap()
}

pub fn lender() -> LenderIdentity {
    LenderIdentity {
        name: "Harbor Auto Finance LLC".into(),
        street: "1 Harbor Way".into(),
        city: "Tampa".into(),
        state: "FL".into(),
        zip: "33602".into(),
        phone: "8135550100".into(),
    }
}

pub fn settings(with_intermediary: bool) -> EnvelopeSettings {
    EnvelopeSettings {
        template_id: "installment-contract-v1".into(),
        email_subject: "Please sign your installment contract".into(),
        intermediary: with_intermediary.then(|| SignerIdentity {
            name: "Coastal Title Services".into(),
            email: "docs@coastaltitle.test".into(),
        }),
    }
}

pub fn service_with(provider: SignatureProviderBox, with_intermediary: bool) -> LoanService {
    let orchestrator = EnvelopeOrchestrator::new(
        FieldSynthesizer::new(lender()),
        settings(with_intermediary),
        provider,
    );
    LoanService::new(Stores::in_memory(), orchestrator)
}

pub fn service() -> LoanService {
    service_with(Box::new(DryRunSignatureProvider::new()), false)
}

/// A complete, valid application for the fixture borrower.
pub fn application() -> ApplicationForm {
    let mut form = ApplicationForm::from(&bundle().borrower);
    form.references = vec![Reference {
        name: Some("Luis Lopez".into()),
        phone: Some("305-555-0142".into()),
        email: None,
    }];
    form
}

/// Registers the fixture dealership and borrower and creates their loan.
pub async fn seeded(service: &LoanService) -> Loan {
    let bundle = bundle();
    service
        .register_organization(bundle.organization.clone())
        .await
        .unwrap();
    service.register_borrower(bundle.borrower.clone()).await.unwrap();
    service
        .create_loan(bundle.organization.id, bundle.borrower.id, bundle.loan)
        .await
        .unwrap()
}

/// Same as [`seeded`] with the borrower left unverified.
pub async fn seeded_unverified(service: &LoanService) -> Loan {
    let mut bundle = bundle();
    bundle.borrower.verification = BorrowerVerification::Unverified;
    service
        .register_organization(bundle.organization.clone())
        .await
        .unwrap();
    service.register_borrower(bundle.borrower.clone()).await.unwrap();
    service
        .create_loan(bundle.organization.id, bundle.borrower.id, bundle.loan)
        .await
        .unwrap()
}

/// A provider that fails the first `failures` calls, then behaves like the
/// dry-run provider.
#[derive(Clone)]
pub struct FlakyProvider {
    failures: usize,
    calls: Arc<AtomicUsize>,
    inner: DryRunSignatureProvider,
    rejection: bool,
}

impl FlakyProvider {
    pub fn unreachable(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
            inner: DryRunSignatureProvider::new(),
            rejection: false,
        }
    }

    pub fn rejecting(failures: usize) -> Self {
        Self {
            rejection: true,
            ..Self::unreachable(failures)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that got past the injected failures.
    pub async fn requests(&self) -> Vec<EnvelopeRequest> {
        self.inner.requests().await
    }
}

#[async_trait]
impl SignatureProvider for FlakyProvider {
    async fn create_envelope(
        &self,
        request: &EnvelopeRequest,
    ) -> Result<EnvelopeReceipt, EnvelopeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(if self.rejection {
                EnvelopeError::Rejected {
                    code: "INVALID_REQUEST_PARAMETER".into(),
                    message: "template field mismatch".into(),
                }
            } else {
                EnvelopeError::Unreachable("connection reset by peer".into())
            });
        }
        self.inner.create_envelope(request).await
    }
}
