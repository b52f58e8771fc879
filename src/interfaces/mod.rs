//! Input and output formats used by the command-line harness.

pub mod bundle;
pub mod csv;
