//! Integration tests for account listing and balance enrichment

mod common;

use chainview::error::ErrorKind;
use chainview::rest::RestClient;
use common::{account, accounts_config, fetcher, unreachable_endpoint, MockChain, MockNode};
use serde_json::json;
use std::time::Duration;

fn client(node: &MockNode) -> RestClient {
    RestClient::new(fetcher(), node.endpoint.clone())
}

#[tokio::test]
async fn test_failed_balance_keeps_account() {
    let mut chain = MockChain {
        accounts: vec![
            account("cosmos1alice", "/cosmos.auth.v1beta1.BaseAccount"),
            account("cosmos1bob", "/cosmos.auth.v1beta1.BaseAccount"),
            account("cosmos1carol", "/cosmos.auth.v1beta1.BaseAccount"),
        ],
        ..MockChain::default()
    };
    chain.failing_balances.insert("cosmos1bob".to_string());
    let node = MockNode::start(chain).await;

    let list = client(&node)
        .enrich_accounts(&accounts_config(8))
        .await
        .expect("a failed balance lookup is not fatal");

    let addresses: Vec<&str> = list.accounts.iter().map(|a| a.address.as_str()).collect();
    assert_eq!(addresses, vec!["cosmos1alice", "cosmos1bob", "cosmos1carol"]);

    let bob = &list.accounts[1];
    assert!(bob.degraded);
    assert!(bob.balances.is_empty());

    let alice = &list.accounts[0];
    assert!(!alice.degraded);
    assert_eq!(alice.balances.len(), 2);
    assert_eq!(alice.balances[0].denom, "stake");
    assert_eq!(alice.short_type(), "BaseAccount");

    let notice = list.partial_enrichment().expect("partial enrichment notice");
    assert_eq!(notice.degraded, vec!["cosmos1bob".to_string()]);
    assert_eq!(notice.to_string(), "Balances unavailable for 1 of 3 accounts");
}

#[tokio::test]
async fn test_nested_addresses_and_missing_addresses() {
    let chain = MockChain {
        accounts: vec![
            json!({
                "@type": "/cosmos.auth.v1beta1.ModuleAccount",
                "base_account": { "address": "cosmos1distribution" },
                "name": "distribution"
            }),
            json!({ "@type": "/cosmos.auth.v1beta1.BaseAccount" }),
            account("cosmos1zed", "/cosmos.auth.v1beta1.BaseAccount"),
        ],
        ..MockChain::default()
    };
    let node = MockNode::start(chain).await;

    let list = client(&node).enrich_accounts(&accounts_config(8)).await.unwrap();

    let addresses: Vec<&str> = list.accounts.iter().map(|a| a.address.as_str()).collect();
    assert_eq!(addresses, vec!["cosmos1distribution", "cosmos1zed"]);
    assert_eq!(list.accounts[0].short_type(), "ModuleAccount");

    // The address-less entry never reaches the balances endpoint
    let balance_requests: Vec<String> = node
        .requests()
        .into_iter()
        .filter(|r| r.path.starts_with("/cosmos/bank/v1beta1/balances/"))
        .map(|r| r.path)
        .collect();
    assert_eq!(balance_requests.len(), 2);
}

#[tokio::test]
async fn test_concurrency_cap_and_order() {
    let accounts = (0..12)
        .map(|i| account(&format!("cosmos1acct{:02}", i), "/cosmos.auth.v1beta1.BaseAccount"))
        .collect();
    let chain = MockChain {
        accounts,
        balance_delay: Duration::from_millis(50),
        ..MockChain::default()
    };
    let node = MockNode::start(chain).await;

    let list = tokio::time::timeout(
        Duration::from_secs(10),
        client(&node).enrich_accounts(&accounts_config(3)),
    )
    .await
    .expect("enrichment timed out")
    .unwrap();

    assert_eq!(list.accounts.len(), 12);
    for (i, acct) in list.accounts.iter().enumerate() {
        assert_eq!(acct.address, format!("cosmos1acct{:02}", i));
        assert!(!acct.degraded);
    }

    let peak = node.max_concurrent_balance_requests();
    assert!(peak <= 3, "saw {} concurrent balance lookups", peak);
    assert!(peak >= 1);
}

#[tokio::test]
async fn test_limits_and_truncation() {
    let chain = MockChain {
        accounts_next_key: Some("AoIBAQ==".to_string()),
        ..MockChain::default()
    };
    let node = MockNode::start(chain).await;

    let list = client(&node).enrich_accounts(&accounts_config(8)).await.unwrap();
    assert!(list.truncated);

    let listing = node.requests_to("/cosmos/auth/v1beta1/accounts");
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].param("pagination.limit"), "100");

    let balances = node.requests_to("/cosmos/bank/v1beta1/balances/cosmos1alice");
    assert_eq!(balances[0].param("pagination.limit"), "100");
}

#[tokio::test]
async fn test_account_list_failure_is_fatal() {
    let chain = MockChain {
        accounts_fail: true,
        ..MockChain::default()
    };
    let node = MockNode::start(chain).await;

    let err = client(&node)
        .enrich_accounts(&accounts_config(8))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
    assert!(err.to_string().contains("accounts store unavailable"));

    let rest = RestClient::new(fetcher(), unreachable_endpoint());
    let err = rest.enrich_accounts(&accounts_config(8)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unreachable);
}
