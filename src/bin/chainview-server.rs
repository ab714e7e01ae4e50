#![forbid(unsafe_code)]
//! Snapshot API server: refreshes once on startup, then on demand

use chainview::aggregator::{Aggregator, RefreshRequest};
use chainview::api::{run_api_server, ApiState};
use chainview::cli;
use chainview::config::load_config;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::init_tracing(false);

    let config = load_config()?;
    let defaults = RefreshRequest::from_config(&config.endpoints)?;
    let aggregator = Aggregator::from_config(&config)?;
    let state = Arc::new(ApiState::new(aggregator.clone(), defaults.clone()));

    info!(
        rpc = %defaults.rpc,
        rest = %defaults.rest,
        port = config.api.port,
        "chainview-server.starting"
    );

    tokio::spawn(async move {
        match aggregator.refresh(defaults).await {
            Ok(snapshot) => info!(cycle = snapshot.cycle, "chainview-server.initial_refresh"),
            Err(e) => warn!(error = %e, "chainview-server.initial_refresh_failed"),
        }
    });

    run_api_server(state, config.api.port).await
}
