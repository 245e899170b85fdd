//! Content handling: merging processed writes into banks and the
//! rule-based processor.

pub mod merge;
pub mod rule_processor;

pub use merge::{apply_write, merge_into_bank};
pub use rule_processor::RuleBasedProcessor;
