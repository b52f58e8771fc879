//! Dealer installment-loan lifecycle: amortization, application intake,
//! contract field synthesis, e-signature orchestration and servicing.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
