use super::loan::{BorrowerId, OrganizationId};
use crate::error::{FieldError, LoanError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type VerificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    EmailSent,
    InProgress,
    IdentityVerified,
    PhoneVerified,
    Completed,
    Failed,
    Expired,
}

impl VerificationStatus {
    /// `completed` is final; `failed` and `expired` only allow a fresh start.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Completed | VerificationStatus::Failed | VerificationStatus::Expired
        )
    }

    fn forward(&self) -> Option<VerificationStatus> {
        use VerificationStatus::*;
        match self {
            Pending => Some(EmailSent),
            EmailSent => Some(InProgress),
            InProgress => Some(IdentityVerified),
            IdentityVerified => Some(PhoneVerified),
            PhoneVerified => Some(Completed),
            Completed | Failed | Expired => None,
        }
    }

    pub fn can_move_to(&self, next: VerificationStatus) -> bool {
        use VerificationStatus::*;
        match next {
            Failed | Expired => !self.is_final(),
            Pending => matches!(self, Failed | Expired),
            _ => self.forward() == Some(next),
        }
    }
}

/// A standalone identity check, optionally tied to a borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub id: VerificationId,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub borrower_id: Option<BorrowerId>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: VerificationStatus,
    #[serde(default)]
    pub provider_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Verification {
    pub fn new(organization_id: OrganizationId, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            borrower_id: None,
            email: email.into(),
            phone: None,
            status: VerificationStatus::Pending,
            provider_session: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, next: VerificationStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_move_to(next) {
            return Err(LoanError::Validation(vec![FieldError::new(
                "verification.status",
                format!("cannot move from {:?} to {:?}", self.status, next),
            )]));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}
