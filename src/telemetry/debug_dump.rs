//! Debug snapshot of the whole cache with token estimates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::types::{BankContent, BankKey, content_size, estimate_tokens};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub total_tokens: usize,
    pub bank_tokens: BTreeMap<String, usize>,
    pub timestamp: DateTime<Utc>,
}

/// `{cache, metrics}` document written to the debug dump path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSnapshot {
    pub cache: BTreeMap<String, BankContent>,
    pub metrics: TokenMetrics,
}

impl DebugSnapshot {
    pub fn capture<'a>(banks: impl IntoIterator<Item = (&'a BankKey, &'a BankContent)>) -> Self {
        let mut cache = BTreeMap::new();
        let mut bank_tokens = BTreeMap::new();
        let mut total_tokens = 0;
        for (key, content) in banks {
            let tokens = estimate_tokens(content_size(content));
            total_tokens += tokens;
            bank_tokens.insert(key.to_string(), tokens);
            cache.insert(key.to_string(), content.clone());
        }
        Self {
            cache,
            metrics: TokenMetrics {
                total_tokens,
                bank_tokens,
                timestamp: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::BankType;

    #[test]
    fn snapshot_counts_tokens_per_bank() {
        let mut content = BankContent::new();
        content.insert("readme.md".into(), "a".repeat(100));
        let key = BankKey::new(BankType::Code, "repo");

        let snapshot = DebugSnapshot::capture([(&key, &content)]);
        assert_eq!(snapshot.metrics.total_tokens, 25);
        assert_eq!(snapshot.metrics.bank_tokens["code:repo"], 25);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cache"]["code:repo"]["readme.md"].as_str().unwrap().len(), 100);
    }
}
