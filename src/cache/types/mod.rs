//! Core data types for the memory-bank cache

pub mod bank;
pub mod statistics;

pub use bank::{BankContent, BankKey, BankType, content_size, estimate_tokens};
