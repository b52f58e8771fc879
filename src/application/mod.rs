//! Application layer: application intake, contract field synthesis, envelope
//! submission and the loan lifecycle service that ties them to storage.

pub mod envelope;
pub mod fields;
pub mod intake;
pub mod loan_service;
pub mod locks;
