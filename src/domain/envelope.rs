//! The signing-request contract shared with the e-signature collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerRole {
    Lender,
    Borrower,
    Intermediary,
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignerRole::Lender => "lender",
            SignerRole::Borrower => "borrower",
            SignerRole::Intermediary => "intermediary",
        })
    }
}

/// One positionally-addressed document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Created,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningParty {
    pub role: SignerRole,
    pub recipient_order: u32,
    pub email: String,
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRequest {
    pub template_id: String,
    pub email_subject: String,
    pub parties: Vec<SigningParty>,
    pub status: EnvelopeStatus,
}

impl EnvelopeRequest {
    /// The party asked to sign first (lowest routing order).
    pub fn first_signer(&self) -> Option<&SigningParty> {
        self.parties.iter().min_by_key(|party| party.recipient_order)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeReceipt {
    pub envelope_id: String,
    pub status: String,
    pub status_date_time: DateTime<Utc>,
}

/// A signer as tracked on the loan once the envelope is out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSlot {
    pub role: SignerRole,
    pub routing_order: u32,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Envelope bookkeeping persisted on the loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRef {
    pub envelope_id: String,
    pub accepted_at: DateTime<Utc>,
    pub signers: Vec<SignerSlot>,
}

impl EnvelopeRef {
    pub fn from_request(receipt: &EnvelopeReceipt, request: &EnvelopeRequest) -> Self {
        let mut signers: Vec<SignerSlot> = request
            .parties
            .iter()
            .map(|party| SignerSlot {
                role: party.role,
                routing_order: party.recipient_order,
                signed_at: None,
            })
            .collect();
        signers.sort_by_key(|slot| slot.routing_order);

        Self {
            envelope_id: receipt.envelope_id.clone(),
            accepted_at: receipt.status_date_time,
            signers,
        }
    }

    pub fn is_required(&self, role: SignerRole) -> bool {
        self.signers.iter().any(|slot| slot.role == role)
    }

    pub fn has_signed(&self, role: SignerRole) -> bool {
        self.signers
            .iter()
            .any(|slot| slot.role == role && slot.signed_at.is_some())
    }

    /// Records a signature. Returns `false` when it was already recorded.
    pub fn record_signature(&mut self, role: SignerRole, at: DateTime<Utc>) -> bool {
        match self
            .signers
            .iter_mut()
            .find(|slot| slot.role == role && slot.signed_at.is_none())
        {
            Some(slot) => {
                slot.signed_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// The unsigned party with the lowest routing order, if any.
    pub fn next_unsigned(&self) -> Option<SignerRole> {
        self.signers
            .iter()
            .filter(|slot| slot.signed_at.is_none())
            .min_by_key(|slot| slot.routing_order)
            .map(|slot| slot.role)
    }

    pub fn all_signed(&self) -> bool {
        self.signers.iter().all(|slot| slot.signed_at.is_some())
    }
}
