//! Cache-versus-disk consistency checking
//!
//! Compares cached bank contents with the files on disk and writes
//! diagnostic snapshots when they disagree.

pub mod checker;
pub mod report;

pub use checker::ConsistencyChecker;
pub use report::{BankConsistency, ConsistencyIssue, ConsistencyReport, DiagnosticSnapshot};
