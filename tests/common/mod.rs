//! In-process mock of a CometBFT RPC + Cosmos REST node
//!
//! Serves every route the explorer consumes from one axum server and records
//! each request so tests can assert on exactly what was asked.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chainview::config::{AccountsConfig, SearchConfig};
use chainview::fetcher::{Endpoint, HttpFetcher};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const QUOTED_QUERY: &str = "\"tx.height>0\"";
pub const BARE_QUERY: &str = "tx.height>0";
pub const QUOTED_ORDER: &str = "\"desc\"";
pub const BARE_ORDER: &str = "desc";

/// What the mock chain looks like and how it misbehaves.
#[derive(Clone)]
pub struct MockChain {
    /// `None` makes `/status` answer 500.
    pub latest_height: Option<u64>,
    /// Replaces the whole `/status` result.
    pub status_result: Option<Value>,
    pub accepted_query: String,
    pub accepted_order: String,
    /// Reported `total_count`, verbatim.
    pub tx_total_count: String,
    /// Transactions the index actually holds.
    pub tx_count: usize,
    pub fail_tx_page: Option<u32>,
    pub indexing_disabled: bool,
    pub accounts: Vec<Value>,
    pub accounts_next_key: Option<String>,
    pub accounts_fail: bool,
    pub failing_balances: HashSet<String>,
    pub balance_delay: Duration,
    pub block_delay: Duration,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            latest_height: Some(40),
            status_result: None,
            accepted_query: QUOTED_QUERY.to_string(),
            accepted_order: QUOTED_ORDER.to_string(),
            tx_total_count: "0".to_string(),
            tx_count: 0,
            fail_tx_page: None,
            indexing_disabled: false,
            accounts: vec![
                account("cosmos1alice", "/cosmos.auth.v1beta1.BaseAccount"),
                account("cosmos1bob", "/cosmos.auth.v1beta1.BaseAccount"),
            ],
            accounts_next_key: None,
            accounts_fail: false,
            failing_balances: HashSet::new(),
            balance_delay: Duration::ZERO,
            block_delay: Duration::ZERO,
        }
    }
}

impl MockChain {
    pub fn with_transactions(mut self, count: usize) -> Self {
        self.tx_count = count;
        self.tx_total_count = count.to_string();
        self
    }

    pub fn accepting(mut self, query: &str, order: &str) -> Self {
        self.accepted_query = query.to_string();
        self.accepted_order = order.to_string();
        self
    }
}

pub fn account(address: &str, type_url: &str) -> Value {
    json!({
        "@type": type_url,
        "address": address,
        "pub_key": null,
        "account_number": "0",
        "sequence": "0"
    })
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub params: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or_default()
    }
}

struct MockState {
    chain: MockChain,
    requests: Mutex<Vec<RecordedRequest>>,
    balances_in_flight: AtomicUsize,
    max_balances_in_flight: AtomicUsize,
}

impl MockState {
    fn record(&self, path: &str, params: HashMap<String, String>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            params,
        });
    }
}

pub struct MockNode {
    pub endpoint: Endpoint,
    state: Arc<MockState>,
}

impl MockNode {
    pub async fn start(chain: MockChain) -> Self {
        let state = Arc::new(MockState {
            chain,
            requests: Mutex::new(Vec::new()),
            balances_in_flight: AtomicUsize::new(0),
            max_balances_in_flight: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/status", get(status))
            .route("/block", get(block))
            .route("/tx_search", get(tx_search))
            .route("/cosmos/auth/v1beta1/accounts", get(accounts))
            .route("/cosmos/bank/v1beta1/balances/:address", get(balances))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock node");
        let addr = listener.local_addr().expect("mock node address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            endpoint: Endpoint::parse(&format!("http://{}", addr)).expect("mock endpoint"),
            state,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn max_concurrent_balance_requests(&self) -> usize {
        self.state.max_balances_in_flight.load(Ordering::SeqCst)
    }
}

/// Nothing listens on port 1.
pub fn unreachable_endpoint() -> Endpoint {
    Endpoint::parse("http://127.0.0.1:1").expect("unreachable endpoint")
}

pub fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5)).expect("http client")
}

pub fn search_config() -> SearchConfig {
    SearchConfig::default()
}

pub fn accounts_config(max_concurrent_lookups: usize) -> AccountsConfig {
    AccountsConfig {
        max_concurrent_lookups,
        ..AccountsConfig::default()
    }
}

fn rpc_ok(result: Value) -> Response {
    Json(json!({ "jsonrpc": "2.0", "id": -1, "result": result })).into_response()
}

fn rpc_error(message: &str, data: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "error": { "code": -32603, "message": message, "data": data }
        })),
    )
        .into_response()
}

fn rest_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "code": 13, "message": message, "details": [] })),
    )
        .into_response()
}

async fn status(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record("/status", params);
    if let Some(result) = &state.chain.status_result {
        return rpc_ok(result.clone());
    }
    match state.chain.latest_height {
        Some(height) => rpc_ok(json!({
            "node_info": { "network": "testchain" },
            "sync_info": {
                "latest_block_height": height.to_string(),
                "catching_up": false
            }
        })),
        None => rpc_error("Internal error", "node is shutting down"),
    }
}

async fn block(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let requested = params.get("height").and_then(|h| h.parse::<u64>().ok());
    state.record("/block", params);
    if !state.chain.block_delay.is_zero() {
        tokio::time::sleep(state.chain.block_delay).await;
    }

    let latest = state.chain.latest_height.unwrap_or(1);
    let height = requested.unwrap_or(latest);
    if height > latest {
        return rpc_error(
            "Internal error",
            &format!(
                "height {} must be less than or equal to the current blockchain height {}",
                height, latest
            ),
        );
    }

    let txs: Vec<&str> = (0..height % 3).map(|_| "dHg=").collect();
    rpc_ok(json!({
        "block_id": { "hash": format!("{:064X}", height) },
        "block": {
            "header": {
                "chain_id": "testchain",
                "height": height.to_string(),
                "time": "2024-03-01T12:00:00.000000000Z",
                "proposer_address": "C0FFEE00C0FFEE00C0FFEE00C0FFEE00C0FFEE00"
            },
            "data": { "txs": if txs.is_empty() { Value::Null } else { json!(txs) } }
        }
    }))
}

fn tx_json(index: usize, total: usize) -> Value {
    json!({
        "hash": format!("{:064X}", index),
        "height": (total - index).to_string(),
        "index": 0,
        "tx": "CpIBCo8BChwvY29zbW9z",
        "tx_result": {
            "code": if index % 5 == 4 { 5 } else { 0 },
            "log": if index % 5 == 4 { "insufficient funds" } else { "" },
            "gas_used": "51234",
            "gas_wanted": "200000"
        }
    })
}

async fn tx_search(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let chain = &state.chain;
    let query = params.get("query").cloned().unwrap_or_default();
    let order = params.get("order_by").cloned().unwrap_or_default();
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = params
        .get("per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(30);
    state.record("/tx_search", params);

    if chain.indexing_disabled {
        return rpc_error("Internal error", "transaction indexing is disabled");
    }
    if query != chain.accepted_query || order != chain.accepted_order {
        return rpc_error(
            "Invalid params",
            "error converting json params to arguments: invalid character looking for beginning of value",
        );
    }
    if chain.fail_tx_page == Some(page as u32) {
        return rpc_error("Internal error", "timed out waiting for tx index");
    }

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(chain.tx_count);
    let txs: Vec<Value> = (start..end).map(|i| tx_json(i, chain.tx_count)).collect();
    rpc_ok(json!({ "txs": txs, "total_count": chain.tx_total_count }))
}

async fn accounts(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit: usize = params
        .get("pagination.limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(100);
    state.record("/cosmos/auth/v1beta1/accounts", params);

    if state.chain.accounts_fail {
        return rest_error("accounts store unavailable");
    }
    let accounts: Vec<Value> = state.chain.accounts.iter().take(limit).cloned().collect();
    Json(json!({
        "accounts": accounts,
        "pagination": {
            "next_key": state.chain.accounts_next_key,
            "total": state.chain.accounts.len().to_string()
        }
    }))
    .into_response()
}

async fn balances(
    State(state): State<Arc<MockState>>,
    Path(address): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record(&format!("/cosmos/bank/v1beta1/balances/{}", address), params);

    let now = state.balances_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_balances_in_flight.fetch_max(now, Ordering::SeqCst);
    if !state.chain.balance_delay.is_zero() {
        tokio::time::sleep(state.chain.balance_delay).await;
    }
    state.balances_in_flight.fetch_sub(1, Ordering::SeqCst);

    if state.chain.failing_balances.contains(&address) {
        return rest_error("balance lookup failed");
    }
    Json(json!({
        "balances": [
            { "denom": "stake", "amount": "1000" },
            { "denom": "token", "amount": address.len().to_string() }
        ],
        "pagination": { "next_key": null, "total": "2" }
    }))
    .into_response()
}
