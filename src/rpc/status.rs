//! Height resolution from `/status`

use super::{value_to_string, RpcClient};
use crate::error::{ExplorerError, Result};
use crate::types::ChainHeight;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct StatusResult {
    #[serde(default)]
    sync_info: Option<SyncInfo>,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde(default)]
    latest_block_height: Option<Value>,
}

impl RpcClient {
    /// One `/status` call, no retry.
    ///
    /// An unparseable body stays `Decode`; `MalformedStatus` is only for a
    /// response that decodes but lacks a usable height.
    pub async fn resolve_latest_height(&self) -> Result<ChainHeight> {
        let status: Option<StatusResult> = self.call("/status", &[]).await?;

        let raw = status
            .and_then(|s| s.sync_info)
            .and_then(|info| info.latest_block_height)
            .as_ref()
            .and_then(value_to_string)
            .ok_or_else(|| {
                ExplorerError::MalformedStatus(
                    "missing result.sync_info.latest_block_height".to_string(),
                )
            })?;

        ChainHeight::parse(&raw).map_err(|_| {
            ExplorerError::MalformedStatus(format!("latest_block_height {:?} is not a height", raw))
        })
    }
}
