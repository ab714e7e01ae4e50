//! Refresh orchestration
//!
//! A refresh cycle runs four stages in order: height, block, transaction
//! search, accounts. Each stage records its own outcome; an earlier failure
//! never stops a later stage. The finished [`Snapshot`] replaces the previous
//! one in a single swap.
//!
//! Starting a refresh aborts the cycle still in flight, and a cycle whose
//! generation is no longer current can never publish.

use crate::config::{AccountsConfig, Config, EndpointConfig, SearchConfig};
use crate::error::{ErrorKind, ExplorerError, Result};
use crate::fetcher::{Endpoint, HttpFetcher};
use crate::rest::RestClient;
use crate::rpc::RpcClient;
use crate::types::{AccountList, Block, ChainHeight, PartialEnrichment, TransactionSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What the consumer asks one cycle to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub rpc: Endpoint,
    pub rest: Endpoint,
    /// Block to show instead of the latest one.
    pub height: Option<ChainHeight>,
}

impl RefreshRequest {
    pub fn new(rpc: Endpoint, rest: Endpoint) -> Self {
        Self {
            rpc,
            rest,
            height: None,
        }
    }

    pub fn from_config(endpoints: &EndpointConfig) -> Result<Self> {
        Ok(Self::new(
            Endpoint::parse(&endpoints.rpc_url)?,
            Endpoint::parse(&endpoints.rest_url)?,
        ))
    }

    pub fn with_height(mut self, height: Option<ChainHeight>) -> Self {
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ExplorerError> for StageError {
    fn from(err: &ExplorerError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one stage of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Ready { value: T },
    Failed { error: StageError },
    Skipped { reason: String },
}

impl<T> StageOutcome<T> {
    fn record(stage: &'static str, cycle: u64, result: Result<T>) -> Self {
        match result {
            Ok(value) => StageOutcome::Ready { value },
            Err(err) => {
                warn!(cycle, stage, kind = ?err.kind(), error = %err, "refresh.stage_failed");
                StageOutcome::Failed {
                    error: StageError::from(&err),
                }
            }
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Ready { value } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StageError> {
        match self {
            StageOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, StageOutcome::Ready { .. })
    }
}

/// The combined view produced by one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub cycle: u64,
    pub rpc_url: String,
    pub rest_url: String,
    pub requested_height: Option<ChainHeight>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub height: StageOutcome<ChainHeight>,
    pub block: StageOutcome<Block>,
    pub transactions: StageOutcome<TransactionSet>,
    pub accounts: StageOutcome<AccountList>,
}

impl Snapshot {
    pub fn partial_enrichment(&self) -> Option<PartialEnrichment> {
        self.accounts.value().and_then(AccountList::partial_enrichment)
    }

    /// Error text per stage, in stage order.
    pub fn errors(&self) -> Vec<(&'static str, &StageError)> {
        [
            ("height", self.height.error()),
            ("block", self.block.error()),
            ("transactions", self.transactions.error()),
            ("accounts", self.accounts.error()),
        ]
        .into_iter()
        .filter_map(|(stage, error)| error.map(|e| (stage, e)))
        .collect()
    }
}

struct Inner {
    fetcher: HttpFetcher,
    search: SearchConfig,
    accounts: AccountsConfig,
    current: RwLock<Option<Arc<Snapshot>>>,
    generation: AtomicU64,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// A requested height fetches its block even when height resolution failed.
    async fn run_cycle(&self, cycle: u64, request: &RefreshRequest) -> Snapshot {
        let started_at = Utc::now();
        info!(cycle, rpc = %request.rpc, rest = %request.rest, "refresh.start");

        let rpc = RpcClient::new(self.fetcher.clone(), request.rpc.clone());
        let rest = RestClient::new(self.fetcher.clone(), request.rest.clone());

        let height = StageOutcome::record("height", cycle, rpc.resolve_latest_height().await);
        self.warn_on_height_regression(cycle, &height).await;

        let target = request.height.clone().or_else(|| height.value().cloned());
        let block = match target {
            Some(target) => {
                StageOutcome::record("block", cycle, rpc.fetch_block(Some(&target)).await)
            }
            None => StageOutcome::Skipped {
                reason: "No block height available: latest height unresolved and none requested"
                    .to_string(),
            },
        };

        let transactions = StageOutcome::record(
            "transactions",
            cycle,
            rpc.search_transactions(&self.search).await,
        );
        let accounts =
            StageOutcome::record("accounts", cycle, rest.enrich_accounts(&self.accounts).await);

        let snapshot = Snapshot {
            cycle,
            rpc_url: request.rpc.to_string(),
            rest_url: request.rest.to_string(),
            requested_height: request.height.clone(),
            started_at,
            completed_at: Utc::now(),
            height,
            block,
            transactions,
            accounts,
        };
        info!(
            cycle,
            failed_stages = snapshot.errors().len(),
            "refresh.complete"
        );
        snapshot
    }

    /// Heights should never go backwards between cycles; when they do, the
    /// consumer usually pointed us at a different node.
    async fn warn_on_height_regression(&self, cycle: u64, height: &StageOutcome<ChainHeight>) {
        let Some(now) = height.value().and_then(ChainHeight::value) else {
            return;
        };
        let previous = self
            .current
            .read()
            .await
            .as_ref()
            .and_then(|s| s.height.value().and_then(ChainHeight::value));
        if let Some(previous) = previous.filter(|previous| now < *previous) {
            warn!(cycle, previous, now, "refresh.height_regressed");
        }
    }

    /// Swaps in `snapshot` unless a newer cycle has started.
    async fn publish(&self, cycle: u64, snapshot: Arc<Snapshot>) -> bool {
        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != cycle {
            return false;
        }
        *current = Some(snapshot);
        true
    }
}

/// Coordinates refresh cycles and holds the latest snapshot.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

impl Aggregator {
    pub fn new(fetcher: HttpFetcher, search: SearchConfig, accounts: AccountsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                search,
                accounts,
                current: RwLock::new(None),
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.client.timeout()?)?;
        Ok(Self::new(
            fetcher,
            config.search.clone(),
            config.accounts.clone(),
        ))
    }

    /// Latest published snapshot, if any cycle has finished.
    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.current.read().await.clone()
    }

    /// Runs one full cycle and publishes it.
    ///
    /// Aborts whatever cycle was still running. Returns
    /// [`ExplorerError::Cancelled`] if this cycle is itself superseded before
    /// it can publish.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<Arc<Snapshot>> {
        let (tx, rx) = oneshot::channel();

        {
            let mut in_flight = self.inner.in_flight.lock().await;
            let cycle = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(stale) = in_flight.take() {
                if !stale.is_finished() {
                    stale.abort();
                    info!(cycle, "refresh.superseded_stale_cycle");
                }
            }

            let inner = self.inner.clone();
            *in_flight = Some(tokio::spawn(async move {
                let snapshot = Arc::new(inner.run_cycle(cycle, &request).await);
                if inner.publish(cycle, snapshot.clone()).await {
                    let _ = tx.send(snapshot);
                }
            }));
        }

        rx.await.map_err(|_| ExplorerError::Cancelled)
    }

    /// Abandons the in-flight cycle, if any, without starting a new one.
    pub async fn cancel(&self) {
        let mut in_flight = self.inner.in_flight.lock().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = in_flight.take() {
            if !task.is_finished() {
                task.abort();
                info!("refresh.cancelled");
            }
        }
    }

    /// Fetches one block and publishes a snapshot where only the block stage
    /// changed. A failed lookup clears the previously shown block.
    ///
    /// The block is grafted onto the current snapshot only when that snapshot
    /// came from `rpc`; otherwise the result stands alone with the other
    /// stages skipped. Returns [`ExplorerError::Cancelled`] without publishing
    /// if a refresh, cancel or other lookup changed the snapshot meanwhile.
    pub async fn lookup_block(
        &self,
        rpc: &Endpoint,
        height: Option<ChainHeight>,
    ) -> Result<Arc<Snapshot>> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let seen = self.snapshot().await;

        let started_at = Utc::now();
        let client = RpcClient::new(self.inner.fetcher.clone(), rpc.clone());
        let result = client.fetch_block(height.as_ref()).await;

        let mut current = self.inner.current.write().await;
        let unchanged = match (seen.as_ref(), current.as_ref()) {
            (Some(seen), Some(now)) => Arc::ptr_eq(seen, now),
            (None, None) => true,
            _ => false,
        };
        if !unchanged || self.inner.generation.load(Ordering::SeqCst) != generation {
            info!(rpc = %rpc, "block_lookup.superseded");
            return Err(ExplorerError::Cancelled);
        }

        let cycle = current.as_ref().map_or(0, |s| s.cycle);
        let block = StageOutcome::record("block", cycle, result);

        let next = match current.as_deref().filter(|s| s.rpc_url == rpc.as_str()) {
            Some(previous) => Snapshot {
                requested_height: height,
                completed_at: Utc::now(),
                block,
                ..previous.clone()
            },
            None => {
                let not_refreshed = || "No refresh has run against this RPC endpoint".to_string();
                Snapshot {
                    cycle,
                    rpc_url: rpc.to_string(),
                    rest_url: String::new(),
                    requested_height: height,
                    started_at,
                    completed_at: Utc::now(),
                    height: StageOutcome::Skipped {
                        reason: not_refreshed(),
                    },
                    block,
                    transactions: StageOutcome::Skipped {
                        reason: not_refreshed(),
                    },
                    accounts: StageOutcome::Skipped {
                        reason: not_refreshed(),
                    },
                }
            }
        };

        let next = Arc::new(next);
        *current = Some(next.clone());
        Ok(next)
    }
}
