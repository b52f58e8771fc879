//! Runtime configuration read from environment variables (and `.env`).

use crate::application::envelope::{EnvelopeSettings, SignerIdentity};
use crate::application::fields::LenderIdentity;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Incomplete configuration: {0} must be set together")]
    Incomplete(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Funding lender printed on every contract
    pub lender: LenderIdentity,

    /// Signature template, subject and optional third signer
    pub envelope: EnvelopeSettings,

    /// RocksDB directory, when persistent storage is wanted
    pub db_path: Option<PathBuf>,

    /// Log filter (RUST_LOG)
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env is optional
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let var_or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let lender = LenderIdentity {
            name: var_or("LOANFLOW_LENDER_NAME", "Harbor Auto Finance LLC"),
            street: var_or("LOANFLOW_LENDER_STREET", "1 Harbor Way"),
            city: var_or("LOANFLOW_LENDER_CITY", "Tampa"),
            state: var_or("LOANFLOW_LENDER_STATE", "FL"),
            zip: var_or("LOANFLOW_LENDER_ZIP", "33602"),
            phone: var_or("LOANFLOW_LENDER_PHONE", "8135550100"),
        };
        if lender.state.len() != 2 {
            return Err(ConfigError::InvalidValue {
                name: "LOANFLOW_LENDER_STATE",
                value: lender.state,
            });
        }

        let intermediary = match (
            var("LOANFLOW_INTERMEDIARY_NAME"),
            var("LOANFLOW_INTERMEDIARY_EMAIL"),
        ) {
            (Some(name), Some(email)) => Some(SignerIdentity { name, email }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Incomplete(
                    "LOANFLOW_INTERMEDIARY_NAME and LOANFLOW_INTERMEDIARY_EMAIL",
                ));
            }
        };

        let envelope = EnvelopeSettings {
            template_id: var_or("LOANFLOW_TEMPLATE_ID", "installment-contract-v1"),
            email_subject: var_or(
                "LOANFLOW_EMAIL_SUBJECT",
                "Please sign your installment contract",
            ),
            intermediary,
        };

        Ok(Config {
            lender,
            envelope,
            db_path: var("LOANFLOW_DB_PATH").map(PathBuf::from),
            log_level: var_or("RUST_LOG", "info"),
        })
    }
}
