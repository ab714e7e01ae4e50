//! Full transaction search over `/tx_search`
//!
//! Nodes disagree on how `query` and `order_by` must be encoded: some accept
//! JSON-quoted strings, others only bare tokens. The engine keeps an ordered
//! list of encodings and probes each one with a single page-1 request. The
//! first encoding that answers page 1 is then used for every remaining page;
//! a failure after page 1 aborts the search rather than switching encodings.

use super::{node_message, value_to_string, RpcClient};
use crate::config::SearchConfig;
use crate::error::{ExplorerError, Result, VariantFailure};
use crate::types::{ChainHeight, Transaction, TransactionPage, TransactionSet};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

/// One way of spelling "all transactions above height 0, newest first".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEncoding {
    pub query: String,
    pub order_by: String,
}

impl SearchEncoding {
    fn params(&self, per_page: u32, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query.clone()),
            ("per_page", per_page.to_string()),
            ("order_by", self.order_by.clone()),
            ("page", page.to_string()),
        ]
    }
}

/// Every query variant paired with every order variant, query-major.
pub fn encoding_candidates(queries: &[String], orders: &[String]) -> Vec<SearchEncoding> {
    queries
        .iter()
        .flat_map(|query| {
            orders.iter().map(move |order_by| SearchEncoding {
                query: query.clone(),
                order_by: order_by.clone(),
            })
        })
        .collect()
}

/// `ceil(total_count / page_size)`, never less than one page.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Deserialize)]
struct TxSearchResult {
    #[serde(default)]
    total_count: Option<Value>,
    #[serde(default)]
    txs: Option<Vec<WireTx>>,
}

#[derive(Debug, Deserialize)]
struct WireTx {
    hash: String,
    height: String,
    #[serde(default)]
    tx: String,
    #[serde(default)]
    tx_result: WireTxResult,
}

#[derive(Debug, Default, Deserialize)]
struct WireTxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default, deserialize_with = "gas_amount")]
    gas_used: u64,
    #[serde(default, deserialize_with = "gas_amount")]
    gas_wanted: u64,
}

fn gas_amount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(s)) if s.is_empty() => Ok(0),
        Some(Value::String(s)) => s.parse().map_err(serde::de::Error::custom),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("gas amount {} is not a u64", n))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected gas amount {}",
            other
        ))),
    }
}

impl TryFrom<WireTx> for Transaction {
    type Error = ExplorerError;

    fn try_from(wire: WireTx) -> Result<Self> {
        let height = ChainHeight::parse(&wire.height).map_err(|e| ExplorerError::Decode(e.to_string()))?;
        Ok(Transaction {
            hash: wire.hash,
            height,
            raw_payload: wire.tx,
            result_code: wire.tx_result.code,
            log: wire.tx_result.log,
            gas_used: wire.tx_result.gas_used,
            gas_wanted: wire.tx_result.gas_wanted,
        })
    }
}

/// Non-numeric counts are treated as zero.
fn parse_total_count(raw: Option<&Value>) -> u64 {
    let Some(text) = raw.and_then(value_to_string) else {
        return 0;
    };
    match text.trim().parse::<u64>() {
        Ok(count) => count,
        Err(_) => {
            warn!(total_count = %text, "tx_search.total_count_unparseable");
            0
        }
    }
}

fn is_indexing_disabled(err: &ExplorerError) -> bool {
    node_message(err).is_some_and(|message| {
        let message = message.to_ascii_lowercase();
        message.contains("indexing is disabled") || message.contains("tx indexing is disabled")
    })
}

/// Multi-variant, multi-page search engine.
pub struct TxSearch<'a> {
    rpc: &'a RpcClient,
    page_size: u32,
    candidates: Vec<SearchEncoding>,
}

impl<'a> TxSearch<'a> {
    pub fn new(rpc: &'a RpcClient, settings: &SearchConfig) -> Self {
        Self {
            rpc,
            page_size: settings.page_size,
            candidates: encoding_candidates(&settings.query_variants, &settings.order_variants),
        }
    }

    pub fn candidates(&self) -> &[SearchEncoding] {
        &self.candidates
    }

    /// Downloads every page for the first encoding the node accepts.
    pub async fn run(&self) -> Result<TransactionSet> {
        let mut attempts = Vec::new();

        for encoding in &self.candidates {
            let first = match self.fetch_page(encoding, 1).await {
                Ok(page) => page,
                Err(err) if is_indexing_disabled(&err) => {
                    return Err(ExplorerError::IndexingDisabled(err.to_string()));
                }
                Err(err) => {
                    debug!(
                        query = %encoding.query,
                        order_by = %encoding.order_by,
                        error = %err,
                        "tx_search.fallback"
                    );
                    attempts.push(VariantFailure {
                        query: encoding.query.clone(),
                        order_by: encoding.order_by.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            return self.collect_pages(encoding, first).await;
        }

        warn!(attempts = attempts.len(), "tx_search.exhausted");
        Err(ExplorerError::AllVariantsExhausted { attempts })
    }

    async fn collect_pages(
        &self,
        encoding: &SearchEncoding,
        first: TransactionPage,
    ) -> Result<TransactionSet> {
        let total_count = first.total_count;
        let pages = total_pages(total_count, self.page_size);
        let mut transactions = first.transactions;

        for page in 2..=pages {
            let next = self
                .fetch_page(encoding, page)
                .await
                .map_err(|source| ExplorerError::SearchAborted {
                    page,
                    source: Box::new(source),
                })?;
            transactions.extend(next.transactions);
        }

        info!(
            query = %encoding.query,
            order_by = %encoding.order_by,
            total_count,
            pages,
            fetched = transactions.len(),
            "tx_search.complete"
        );

        Ok(TransactionSet {
            transactions,
            total_count,
            pages_fetched: pages,
            query: encoding.query.clone(),
            order_by: encoding.order_by.clone(),
        })
    }

    async fn fetch_page(&self, encoding: &SearchEncoding, page: u32) -> Result<TransactionPage> {
        let params = encoding.params(self.page_size, page);
        let result: TxSearchResult = self
            .rpc
            .call("/tx_search", &params)
            .await?
            .ok_or_else(|| ExplorerError::Decode("tx_search response has no result".to_string()))?;

        let transactions = result
            .txs
            .unwrap_or_default()
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(TransactionPage {
            transactions,
            total_count: parse_total_count(result.total_count.as_ref()),
        })
    }
}

impl RpcClient {
    /// Convenience wrapper around [`TxSearch`].
    pub async fn search_transactions(&self, settings: &SearchConfig) -> Result<TransactionSet> {
        TxSearch::new(self, settings).run().await
    }
}
