//! Domain types and pure rules: amortization, phone normalization, the loan
//! state machine and the ports the application layer talks to.

pub mod amortization;
pub mod borrower;
pub mod envelope;
pub mod loan;
pub mod money;
pub mod organization;
pub mod phone;
pub mod ports;
pub mod schedule;
pub mod state_machine;
pub mod verification;
