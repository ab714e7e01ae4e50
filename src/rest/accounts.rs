//! Account listing with per-account balance enrichment
//!
//! The account list itself must load; every balance lookup after that is
//! allowed to fail on its own. A failed lookup leaves the account in the
//! result with empty balances and `degraded` set.

use super::RestClient;
use crate::config::AccountsConfig;
use crate::error::Result;
use crate::types::{Account, AccountList, Balance};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const ACCOUNTS_PATH: &str = "/cosmos/auth/v1beta1/accounts";
const BALANCES_PATH: &str = "/cosmos/bank/v1beta1/balances";

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Option<Vec<Value>>,
    #[serde(default)]
    pagination: Option<PageResponse>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    next_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Option<Vec<Balance>>,
}

/// An entry of the account list before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Empty when the node did not report one.
    pub address: String,
    pub type_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPage {
    pub records: Vec<AccountRecord>,
    pub truncated: bool,
}

/// Module and vesting accounts nest the address under their base account.
fn account_address(account: &Value) -> Option<&str> {
    [
        &account["address"],
        &account["base_account"]["address"],
        &account["base_vesting_account"]["base_account"]["address"],
    ]
    .into_iter()
    .filter_map(Value::as_str)
    .find(|address| !address.is_empty())
}

fn record_from(account: &Value) -> AccountRecord {
    AccountRecord {
        address: account_address(account).unwrap_or_default().to_string(),
        type_tag: account["@type"].as_str().unwrap_or_default().to_string(),
    }
}

fn unique_by_denom(mut balances: Vec<Balance>) -> Vec<Balance> {
    let mut seen = HashSet::new();
    balances.retain(|balance| seen.insert(balance.denom.clone()));
    balances
}

impl RestClient {
    /// A single bounded page of accounts, in node order.
    pub async fn list_accounts(&self, limit: u32) -> Result<AccountPage> {
        let response: AccountsResponse = self
            .get(ACCOUNTS_PATH, &[("pagination.limit", limit.to_string())])
            .await?;

        let truncated = response
            .pagination
            .and_then(|p| p.next_key)
            .is_some_and(|key| !key.is_empty());
        let records = response
            .accounts
            .unwrap_or_default()
            .iter()
            .map(record_from)
            .collect();

        Ok(AccountPage { records, truncated })
    }

    pub async fn fetch_balances(&self, address: &str, limit: u32) -> Result<Vec<Balance>> {
        let path = format!("{}/{}", BALANCES_PATH, address);
        let response: BalancesResponse = self
            .get(&path, &[("pagination.limit", limit.to_string())])
            .await?;
        Ok(unique_by_denom(response.balances.unwrap_or_default()))
    }
}

/// Lists accounts, then resolves balances with bounded concurrency.
pub struct AccountPipeline<'a> {
    rest: &'a RestClient,
    settings: &'a AccountsConfig,
}

impl<'a> AccountPipeline<'a> {
    pub fn new(rest: &'a RestClient, settings: &'a AccountsConfig) -> Self {
        Self { rest, settings }
    }

    pub async fn run(&self) -> Result<AccountList> {
        let page = self.rest.list_accounts(self.settings.page_limit).await?;

        let listed = page.records.len();
        let records: Vec<AccountRecord> = page
            .records
            .into_iter()
            .filter(|record| !record.address.is_empty())
            .collect();
        if records.len() < listed {
            debug!(skipped = listed - records.len(), "accounts.without_address");
        }

        let accounts: Vec<Account> = stream::iter(records)
            .map(|record| self.enrich(record))
            .buffered(self.settings.max_concurrent_lookups.max(1))
            .collect()
            .await;

        let list = AccountList {
            accounts,
            truncated: page.truncated,
        };
        info!(
            accounts = list.accounts.len(),
            degraded = list.degraded_count(),
            truncated = list.truncated,
            "accounts.complete"
        );
        Ok(list)
    }

    async fn enrich(&self, record: AccountRecord) -> Account {
        match self
            .rest
            .fetch_balances(&record.address, self.settings.balance_limit)
            .await
        {
            Ok(balances) => Account {
                address: record.address,
                type_tag: record.type_tag,
                balances,
                degraded: false,
            },
            Err(err) => {
                warn!(address = %record.address, error = %err, "accounts.degraded");
                Account {
                    address: record.address,
                    type_tag: record.type_tag,
                    balances: Vec::new(),
                    degraded: true,
                }
            }
        }
    }
}

impl RestClient {
    /// Convenience wrapper around [`AccountPipeline`].
    pub async fn enrich_accounts(&self, settings: &AccountsConfig) -> Result<AccountList> {
        AccountPipeline::new(self, settings).run().await
    }
}
