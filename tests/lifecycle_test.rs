mod common;

use chrono::{NaiveDate, Utc};
use common::{FlakyProvider, application, seeded, seeded_unverified, service, service_with, today};
use loanflow::application::intake::ApplicationForm;
use loanflow::application::loan_service::{LoanService, PaymentOutcome};
use loanflow::domain::envelope::SignerRole;
use loanflow::domain::loan::{Loan, ProviderFailureKind, ProviderStatus};
use loanflow::domain::schedule::SettlementStatus;
use loanflow::domain::state_machine::{Actor, LoanEvent, LoanStatus};
use loanflow::domain::verification::{Verification, VerificationStatus};
use loanflow::error::{EnvelopeError, LoanError};

fn admin() -> Actor {
    Actor::Admin("ops@sunshinemotors.test".into())
}

async fn completed(service: &LoanService) -> Loan {
    let loan = seeded(service).await;
    service.send_application(loan.id, admin()).await.unwrap();
    service
        .complete_application(loan.id, &application(), today())
        .await
        .unwrap();
    loan
}

async fn envelope_id(service: &LoanService, loan: &Loan) -> String {
    service
        .loan(loan.id)
        .await
        .unwrap()
        .envelope
        .unwrap()
        .envelope_id
}

async fn active(service: &LoanService) -> Loan {
    let loan = completed(service).await;
    let submission = service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
    for role in [SignerRole::Lender, SignerRole::Borrower] {
        service
            .record_signature(&submission.envelope_id, role, Utc::now())
            .await
            .unwrap();
    }
    service.fund_loan(loan.id, admin()).await.unwrap();
    service.activate_loan(loan.id, admin()).await.unwrap();
    loan
}

#[tokio::test]
async fn test_full_lifecycle_to_active() {
    let service = service();
    let loan = seeded(&service).await;
    assert_eq!(loan.status(), LoanStatus::New);

    service.send_application(loan.id, admin()).await.unwrap();
    service.open_application(loan.id).await.unwrap();
    service
        .complete_application(loan.id, &application(), today())
        .await
        .unwrap();

    let submission = service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
    assert_eq!(submission.transition.to, LoanStatus::PendingOrgSignature);

    let after_lender = service
        .record_signature(&submission.envelope_id, SignerRole::Lender, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_lender.to, LoanStatus::PendingBorrowerSignature);

    let after_borrower = service
        .record_signature(&submission.envelope_id, SignerRole::Borrower, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_borrower.to, LoanStatus::FullySigned);

    service.fund_loan(loan.id, admin()).await.unwrap();
    service.activate_loan(loan.id, admin()).await.unwrap();

    let stored = service.loan(loan.id).await.unwrap();
    assert_eq!(stored.status(), LoanStatus::Active);
    assert_eq!(stored.provider_status, Some(ProviderStatus::Completed));

    let events: Vec<LoanEvent> = service
        .history(loan.id)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events,
        vec![
            LoanEvent::SendApplication,
            LoanEvent::OpenApplication,
            LoanEvent::CompleteApplication,
            LoanEvent::AwaitLenderSignature,
            LoanEvent::AwaitBorrowerSignature,
            LoanEvent::CompleteSignatures,
            LoanEvent::Fund,
            LoanEvent::Activate,
        ]
    );
}

#[tokio::test]
async fn test_send_application_requires_email() {
    let service = service();
    let loan = seeded(&service).await;
    let mut borrower = service.borrower(loan.borrower_id).await.unwrap();
    borrower.email = None;
    service.register_borrower(borrower).await.unwrap();

    let result = service.send_application(loan.id, admin()).await;
    assert!(matches!(result, Err(LoanError::InvalidRecipient(_))));
    assert_eq!(
        service.loan(loan.id).await.unwrap().status(),
        LoanStatus::New
    );
}

#[tokio::test]
async fn test_incomplete_application_lists_every_field() {
    let service = service();
    let loan = seeded(&service).await;
    service.send_application(loan.id, admin()).await.unwrap();

    let form = ApplicationForm {
        first_name: Some("Maria".into()),
        ..ApplicationForm::default()
    };
    match service.complete_application(loan.id, &form, today()).await {
        Err(LoanError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            assert!(fields.contains(&"last_name"));
            assert!(fields.contains(&"email"));
            assert!(fields.contains(&"address.zip"));
            assert!(fields.contains(&"employment.status"));
            assert!(!fields.contains(&"first_name"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(
        service.loan(loan.id).await.unwrap().status(),
        LoanStatus::ApplicationSent
    );
}

#[tokio::test]
async fn test_fund_only_from_fully_signed() {
    let service = service();
    let loan = seeded(&service).await;

    let result = service.fund_loan(loan.id, admin()).await;
    assert!(matches!(
        result,
        Err(LoanError::IllegalTransition {
            from: LoanStatus::New,
            event: LoanEvent::Fund
        })
    ));
    assert!(service.history(loan.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_closed_loan_rejects_everything() {
    let service = service();
    let loan = seeded(&service).await;
    service.close_loan(loan.id, admin()).await.unwrap();

    for result in [
        service.send_application(loan.id, admin()).await,
        service.fund_loan(loan.id, admin()).await,
        service.close_loan(loan.id, admin()).await,
    ] {
        assert!(matches!(
            result,
            Err(LoanError::TerminalState {
                state: LoanStatus::Closed,
                ..
            })
        ));
    }
}

#[tokio::test]
async fn test_provider_failure_keeps_application_completed() {
    let provider = FlakyProvider::unreachable(1);
    let service = service_with(Box::new(provider.clone()), false);
    let loan = completed(&service).await;

    let result = service.submit_envelope(loan.id, today(), admin()).await;
    assert!(matches!(
        result,
        Err(LoanError::Envelope(EnvelopeError::Unreachable(_)))
    ));

    let stored = service.loan(loan.id).await.unwrap();
    assert_eq!(stored.status(), LoanStatus::ApplicationCompleted);
    assert!(stored.envelope.is_none());
    assert!(matches!(
        stored.provider_status,
        Some(ProviderStatus::Failed {
            kind: ProviderFailureKind::Unreachable,
            ..
        })
    ));
    let first_schedule = service.schedule(loan.id).await.unwrap().unwrap();

    // retry with a later date: the stored schedule is reused, not regenerated
    let later = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let submission = service
        .submit_envelope(loan.id, later, admin())
        .await
        .unwrap();
    assert_eq!(submission.transition.from, LoanStatus::ApplicationCompleted);
    assert_eq!(provider.calls(), 2);
    assert_eq!(service.schedule(loan.id).await.unwrap().unwrap(), first_schedule);

    let requests = provider.requests().await;
    let lender_fields = &requests[0].parties[0].fields;
    let field = |label: &str| {
        lender_fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| field.value.clone())
    };
    assert_eq!(field("Document Date").as_deref(), Some("01/05/2024"));
    assert_eq!(field("First Payment Date").as_deref(), Some("01/08/2024"));
    assert_eq!(field("First Payment Date"), field("Payment 1 Due Date"));

    let stored = service.loan(loan.id).await.unwrap();
    assert_eq!(stored.status(), LoanStatus::PendingOrgSignature);
    assert_eq!(stored.provider_status, Some(ProviderStatus::Sent));
}

#[tokio::test]
async fn test_provider_rejection_is_tagged() {
    let service = service_with(Box::new(FlakyProvider::rejecting(1)), false);
    let loan = completed(&service).await;

    let error = service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap_err();
    match error {
        LoanError::Envelope(envelope) => assert!(!envelope.is_retryable()),
        other => panic!("expected envelope error, got {other:?}"),
    }
    assert!(matches!(
        service.loan(loan.id).await.unwrap().provider_status,
        Some(ProviderStatus::Failed {
            kind: ProviderFailureKind::Rejected,
            ..
        })
    ));
}

#[tokio::test]
async fn test_signatures_in_any_order_and_duplicates() {
    let service = service();
    let loan = completed(&service).await;
    service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
    let envelope_id = envelope_id(&service, &loan).await;

    // borrower signs before the lender: still waiting on the lender
    let early = service
        .record_signature(&envelope_id, SignerRole::Borrower, Utc::now())
        .await
        .unwrap();
    assert!(early.is_none());
    assert_eq!(
        service.loan(loan.id).await.unwrap().status(),
        LoanStatus::PendingOrgSignature
    );

    let duplicate = service
        .record_signature(&envelope_id, SignerRole::Borrower, Utc::now())
        .await
        .unwrap();
    assert!(duplicate.is_none());

    let done = service
        .record_signature(&envelope_id, SignerRole::Lender, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.event, LoanEvent::CompleteSignatures);
    assert_eq!(done.to, LoanStatus::FullySigned);

    // a late duplicate after completion changes nothing
    assert!(
        service
            .record_signature(&envelope_id, SignerRole::Lender, Utc::now())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_intermediary_is_routed_last() {
    let service = service_with(
        Box::new(loanflow::infrastructure::esign::DryRunSignatureProvider::new()),
        true,
    );
    let loan = completed(&service).await;
    service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
    let envelope_id = envelope_id(&service, &loan).await;

    let mut statuses = Vec::new();
    for role in [
        SignerRole::Lender,
        SignerRole::Borrower,
        SignerRole::Intermediary,
    ] {
        let record = service
            .record_signature(&envelope_id, role, Utc::now())
            .await
            .unwrap()
            .unwrap();
        statuses.push(record.to);
    }
    assert_eq!(
        statuses,
        vec![
            LoanStatus::PendingBorrowerSignature,
            LoanStatus::PendingIntermediarySignature,
            LoanStatus::FullySigned
        ]
    );
}

#[tokio::test]
async fn test_unknown_envelope_and_signer() {
    let service = service();
    let loan = completed(&service).await;
    service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
    let envelope_id = envelope_id(&service, &loan).await;

    assert!(matches!(
        service
            .record_signature("no-such-envelope", SignerRole::Lender, Utc::now())
            .await,
        Err(LoanError::NotFound { .. })
    ));
    assert!(matches!(
        service
            .record_signature(&envelope_id, SignerRole::Intermediary, Utc::now())
            .await,
        Err(LoanError::Validation(_))
    ));
}

#[tokio::test]
async fn test_verification_gate() {
    let service = service();
    let loan = seeded_unverified(&service).await;
    service.send_application(loan.id, admin()).await.unwrap();
    service
        .complete_application(loan.id, &application(), today())
        .await
        .unwrap();

    let blocked = service.submit_envelope(loan.id, today(), admin()).await;
    assert!(matches!(blocked, Err(LoanError::VerificationRequired(id)) if id == loan.borrower_id));

    let mut verification = Verification::new(loan.organization_id, "maria.lopez@example.com");
    verification.borrower_id = Some(loan.borrower_id);
    let verification_id = verification.id;
    service.register_verification(verification).await.unwrap();
    for status in [
        VerificationStatus::EmailSent,
        VerificationStatus::InProgress,
        VerificationStatus::IdentityVerified,
        VerificationStatus::PhoneVerified,
        VerificationStatus::Completed,
    ] {
        service
            .update_verification(verification_id, status, Utc::now())
            .await
            .unwrap();
    }

    assert!(service.borrower(loan.borrower_id).await.unwrap().is_verified());
    service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_origination_feature_flag() {
    let service = service();
    let mut bundle = common::bundle();
    bundle.organization.features.loan_origination = false;
    service
        .register_organization(bundle.organization.clone())
        .await
        .unwrap();
    service.register_borrower(bundle.borrower.clone()).await.unwrap();

    let result = service
        .create_loan(bundle.organization.id, bundle.borrower.id, bundle.loan)
        .await;
    assert!(matches!(
        result,
        Err(LoanError::FeatureDisabled("loan_origination"))
    ));
}

#[tokio::test]
async fn test_paying_every_entry_settles_the_loan() {
    let service = service();
    let loan = active(&service).await;
    let schedule = service.schedule(loan.id).await.unwrap().unwrap();
    assert_eq!(schedule.len(), 52);

    let mut last = None;
    for entry in &schedule {
        last = service
            .record_payment(
                loan.id,
                entry.sequence,
                PaymentOutcome::Paid {
                    amount: entry.total,
                    on: entry.due_date,
                },
            )
            .await
            .unwrap();
        if entry.sequence < 52 {
            assert!(last.is_none());
        }
    }

    assert_eq!(last.unwrap().to, LoanStatus::Settled);
    let stored = service.schedule(loan.id).await.unwrap().unwrap();
    assert!(stored.iter().all(|entry| entry.status == SettlementStatus::Paid));
    assert!(matches!(
        service
            .record_payment(
                loan.id,
                1,
                PaymentOutcome::Failed { on: today() }
            )
            .await,
        Err(LoanError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_failed_payment_opens_derogatory_review() {
    let service = service();
    let loan = active(&service).await;

    let flagged = service
        .record_payment(loan.id, 1, PaymentOutcome::Failed { on: today() })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flagged.to, LoanStatus::PendingDerogatoryReview);

    // a second failure during review does not transition again
    assert!(
        service
            .record_payment(loan.id, 2, PaymentOutcome::Failed { on: today() })
            .await
            .unwrap()
            .is_none()
    );

    let cleared = service
        .resolve_delinquency(loan.id, false, admin())
        .await
        .unwrap();
    assert_eq!(cleared.to, LoanStatus::Active);
}

#[tokio::test]
async fn test_failed_report_for_paid_entry_is_rejected() {
    let service = service();
    let loan = active(&service).await;
    let first = service.schedule(loan.id).await.unwrap().unwrap()[0].clone();

    service
        .record_payment(
            loan.id,
            1,
            PaymentOutcome::Paid {
                amount: first.total,
                on: first.due_date,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        service
            .record_payment(loan.id, 1, PaymentOutcome::Failed { on: first.due_date })
            .await,
        Err(LoanError::Validation(_))
    ));
    assert_eq!(service.loan(loan.id).await.unwrap().status(), LoanStatus::Active);
    let stored = service.schedule(loan.id).await.unwrap().unwrap();
    assert_eq!(stored[0].status, SettlementStatus::Paid);
}

#[tokio::test]
async fn test_repeated_failure_on_overdue_entry_does_not_reflag() {
    let service = service();
    let loan = active(&service).await;

    service
        .record_payment(loan.id, 1, PaymentOutcome::Failed { on: today() })
        .await
        .unwrap();
    service
        .resolve_delinquency(loan.id, false, admin())
        .await
        .unwrap();

    assert!(
        service
            .record_payment(loan.id, 1, PaymentOutcome::Failed { on: today() })
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(service.loan(loan.id).await.unwrap().status(), LoanStatus::Active);
}

#[tokio::test]
async fn test_overdue_sweep() {
    let service = service();
    let loan = active(&service).await;

    let sweep = service
        .mark_overdue(loan.id, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(sweep.flagged, (1..=8).collect::<Vec<u32>>());
    assert_eq!(
        sweep.transition.map(|t| t.to),
        Some(LoanStatus::PendingDerogatoryReview)
    );

    let confirmed = service
        .resolve_delinquency(loan.id, true, admin())
        .await
        .unwrap();
    assert_eq!(confirmed.to, LoanStatus::Derogatory);
    let defaulted = service.default_loan(loan.id, admin()).await.unwrap();
    assert_eq!(defaulted.to, LoanStatus::Defaulted);
}

#[tokio::test]
async fn test_deleting_borrower_removes_loans_and_schedules() {
    let service = service();
    let loan = completed(&service).await;
    service
        .submit_envelope(loan.id, today(), admin())
        .await
        .unwrap();
    assert!(service.schedule(loan.id).await.unwrap().is_some());

    service.delete_borrower(loan.borrower_id).await.unwrap();

    assert!(matches!(
        service.loan(loan.id).await,
        Err(LoanError::NotFound { entity: "loan", .. })
    ));
    assert!(service.schedule(loan.id).await.unwrap().is_none());
    assert!(matches!(
        service.borrower(loan.borrower_id).await,
        Err(LoanError::NotFound { .. })
    ));
}
