//! Block retrieval from `/block`

use super::{node_message, RpcClient};
use crate::error::{ExplorerError, Result};
use crate::types::{Block, ChainHeight};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BlockResult {
    block_id: BlockId,
    block: Option<WireBlock>,
}

#[derive(Debug, Deserialize)]
struct BlockId {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    header: WireHeader,
    #[serde(default)]
    data: WireBlockData,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    height: String,
    time: DateTime<Utc>,
    proposer_address: String,
    chain_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireBlockData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

/// Phrases CometBFT uses when a height was never produced or was pruned.
const MISSING_HEIGHT_HINTS: [&str; 4] = [
    "must be less than or equal to",
    "is not available",
    "could not find",
    "not found",
];

fn is_missing_height(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    MISSING_HEIGHT_HINTS.iter().any(|hint| message.contains(hint))
}

impl RpcClient {
    /// Without a height the node returns its latest block.
    pub async fn fetch_block(&self, height: Option<&ChainHeight>) -> Result<Block> {
        let label = height.map_or_else(|| "latest".to_string(), ToString::to_string);
        let query: Vec<(&str, String)> = height
            .map(|h| vec![("height", h.to_string())])
            .unwrap_or_default();

        let not_found = |message: String| ExplorerError::NotFound {
            height: label.clone(),
            message,
        };

        let result: Option<BlockResult> = match self.call("/block", &query).await {
            Ok(result) => result,
            Err(err) => {
                return Err(match node_message(&err) {
                    Some(message) if is_missing_height(message) => not_found(message.to_string()),
                    _ => err,
                });
            }
        };

        let BlockResult { block_id, block } =
            result.ok_or_else(|| not_found("response has no result".to_string()))?;
        let block = block.ok_or_else(|| not_found("node returned an empty block".to_string()))?;

        let height = ChainHeight::parse(&block.header.height)
            .map_err(|e| ExplorerError::Decode(e.to_string()))?;

        Ok(Block {
            hash: block_id.hash,
            height,
            timestamp: block.header.time,
            proposer_address: block.header.proposer_address,
            chain_id: block.header.chain_id,
            transaction_count: block.data.txs.map_or(0, |txs| txs.len()),
        })
    }
}
