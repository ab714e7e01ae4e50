//! Domain records assembled from node responses
//!
//! Everything here is built once from a response and never mutated; a later
//! fetch produces a fresh value that supersedes the old one.

use crate::error::{ExplorerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal block height as reported by the node.
///
/// Kept as the node's string so heights beyond `u64` still round-trip, but
/// guaranteed non-empty and made only of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainHeight(String);

impl ChainHeight {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExplorerError::InvalidHeight(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, if it fits in a `u64`.
    pub fn value(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ChainHeight {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainHeight {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChainHeight {
    type Error = ExplorerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ChainHeight> for String {
    fn from(height: ChainHeight) -> Self {
        height.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub hash: String,
    pub height: ChainHeight,
    pub timestamp: DateTime<Utc>,
    pub proposer_address: String,
    pub chain_id: String,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub hash: String,
    pub height: ChainHeight,
    /// Base64 payload exactly as the node returned it; never decoded.
    pub raw_payload: String,
    pub result_code: u32,
    pub log: String,
    pub gas_used: u64,
    pub gas_wanted: u64,
}

impl Transaction {
    /// Code 0 is success; anything else is an execution error inside the
    /// application, not a transport problem.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// One page of `/tx_search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total_count: u64,
}

/// The complete, fully downloaded search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSet {
    /// Descending by height, in the order the node returned them.
    pub transactions: Vec<Transaction>,
    pub total_count: u64,
    pub pages_fetched: u32,
    /// Encoding that the node accepted.
    pub query: String,
    pub order_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Balance {
    pub denom: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub address: String,
    pub type_tag: String,
    /// Unique by denom.
    pub balances: Vec<Balance>,
    /// Set when the balance lookup failed and `balances` is only a stand-in.
    pub degraded: bool,
}

impl Account {
    /// Last segment of the protobuf type URL, e.g. `BaseAccount`.
    pub fn short_type(&self) -> &str {
        self.type_tag
            .rsplit('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.type_tag)
    }
}

/// Result of the enrichment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountList {
    pub accounts: Vec<Account>,
    /// The REST page had more accounts than the configured limit.
    pub truncated: bool,
}

impl AccountList {
    pub fn degraded_count(&self) -> usize {
        self.accounts.iter().filter(|a| a.degraded).count()
    }

    /// Informational notice when some balances could not be loaded.
    pub fn partial_enrichment(&self) -> Option<PartialEnrichment> {
        let degraded: Vec<String> = self
            .accounts
            .iter()
            .filter(|a| a.degraded)
            .map(|a| a.address.clone())
            .collect();
        if degraded.is_empty() {
            None
        } else {
            Some(PartialEnrichment {
                total: self.accounts.len(),
                degraded,
            })
        }
    }
}

/// Some accounts are listed without their balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialEnrichment {
    pub total: usize,
    pub degraded: Vec<String>,
}

impl fmt::Display for PartialEnrichment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Balances unavailable for {} of {} accounts",
            self.degraded.len(),
            self.total
        )
    }
}
