use crate::domain::envelope::{EnvelopeReceipt, EnvelopeRequest};
use crate::domain::ports::SignatureProvider;
use crate::error::EnvelopeError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A signature provider that accepts well-formed requests without sending
/// anything.
///
/// Requests are kept so callers can inspect what would have been sent. Clones
/// share the same record.
#[derive(Default, Clone)]
pub struct DryRunSignatureProvider {
    requests: Arc<RwLock<Vec<EnvelopeRequest>>>,
}

impl DryRunSignatureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requests(&self) -> Vec<EnvelopeRequest> {
        self.requests.read().await.clone()
    }
}

fn reject(code: &str, message: impl Into<String>) -> EnvelopeError {
    EnvelopeError::Rejected {
        code: code.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl SignatureProvider for DryRunSignatureProvider {
    async fn create_envelope(
        &self,
        request: &EnvelopeRequest,
    ) -> Result<EnvelopeReceipt, EnvelopeError> {
        if request.template_id.trim().is_empty() {
            return Err(reject("TEMPLATE_ID_INVALID", "template id is empty"));
        }
        if request.parties.is_empty() {
            return Err(reject("NO_RECIPIENTS", "envelope has no signers"));
        }
        if let Some(party) = request.parties.iter().find(|p| !p.email.contains('@')) {
            return Err(reject(
                "INVALID_EMAIL_ADDRESS_FOR_RECIPIENT",
                format!("{} signer has no usable email", party.role),
            ));
        }

        self.requests.write().await.push(request.clone());
        let receipt = EnvelopeReceipt {
            envelope_id: Uuid::new_v4().to_string(),
            status: "sent".to_string(),
            status_date_time: Utc::now(),
        };
        tracing::debug!(envelope_id = %receipt.envelope_id, "Dry-run envelope accepted");
        Ok(receipt)
    }
}
