//! Bank identity types
//!
//! A memory bank is addressed by its [`BankType`] and an opaque identifier.
//! Bank contents are a map from relative file path to full markdown text.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cache::storage::layout::validate_bank_id;
use crate::cache::traits::CacheOperationError;

/// Relative file path (using `/` separators) to full file text.
pub type BankContent = BTreeMap<String, String>;

/// The three kinds of memory bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankType {
    Global,
    Project,
    Code,
}

impl BankType {
    pub const ALL: [BankType; 3] = [BankType::Global, BankType::Project, BankType::Code];

    pub fn as_str(&self) -> &'static str {
        match self {
            BankType::Global => "global",
            BankType::Project => "project",
            BankType::Code => "code",
        }
    }

    /// Directory under the storage root holding banks of this type
    pub fn directory_name(&self) -> &'static str {
        match self {
            BankType::Global => "global",
            BankType::Project => "projects",
            BankType::Code => "code",
        }
    }
}

impl std::fmt::Display for BankType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BankType {
    type Err = CacheOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(BankType::Global),
            "project" => Ok(BankType::Project),
            "code" => Ok(BankType::Code),
            other => Err(CacheOperationError::UnknownBankType(other.to_string())),
        }
    }
}

/// Unique identity of a bank, rendered as `type:id`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BankKey {
    pub bank_type: BankType,
    pub bank_id: String,
}

impl BankKey {
    pub fn new(bank_type: BankType, bank_id: impl Into<String>) -> Self {
        Self {
            bank_type,
            bank_id: bank_id.into(),
        }
    }

    /// Parse a `(type, id)` pair of strings, failing fast on an unknown type
    /// or an id that would escape the storage layout.
    pub fn parse(bank_type: &str, bank_id: &str) -> Result<Self, CacheOperationError> {
        let key = Self::new(bank_type.parse()?, bank_id);
        key.validate()?;
        Ok(key)
    }

    pub fn validate(&self) -> Result<(), CacheOperationError> {
        validate_bank_id(&self.bank_id)
            .map_err(|_| CacheOperationError::InvalidBankId(self.bank_id.clone()))
    }
}

impl std::fmt::Display for BankKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.bank_type, self.bank_id)
    }
}

impl FromStr for BankKey {
    type Err = CacheOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((bank_type, bank_id)) => Self::parse(bank_type, bank_id),
            None => Err(CacheOperationError::UnknownBankType(s.to_string())),
        }
    }
}

// Serialized as the `type:id` string so keys can index JSON objects.
impl Serialize for BankKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BankKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Rough token estimate used by diagnostics: one token per four characters.
#[inline]
pub fn estimate_tokens(characters: usize) -> usize {
    characters / 4
}

/// Total character count across every file of a bank.
pub fn content_size(content: &BankContent) -> usize {
    content.values().map(|text| text.chars().count()).sum()
}
