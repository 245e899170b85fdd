//! On-disk bank storage
//!
//! [`BankLayout`] maps bank keys to directories under the storage root and
//! [`FileBankStore`] reads and writes bank files there.

pub mod file_store;
pub mod layout;

pub use file_store::FileBankStore;
pub use layout::BankLayout;
