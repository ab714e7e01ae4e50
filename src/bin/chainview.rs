#![forbid(unsafe_code)]
//! Terminal explorer for a Cosmos/CometBFT node

use chainview::aggregator::{Aggregator, RefreshRequest, StageOutcome};
use chainview::cli;
use chainview::config::{load_config_from, DEFAULT_CONFIG_PATH};
use chainview::fetcher::HttpFetcher;
use chainview::rest::RestClient;
use chainview::rpc::RpcClient;
use chainview::types::ChainHeight;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chainview", version, about = "Inspect a Cosmos chain over RPC and REST")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// CometBFT RPC base URL (overrides the config file)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Cosmos REST base URL (overrides the config file)
    #[arg(long, global = true)]
    rest_url: Option<String>,

    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full refresh: height, block, transactions, accounts
    Refresh {
        /// Show this block instead of the latest one
        #[arg(long)]
        height: Option<String>,
    },
    /// Latest block height
    Height,
    /// One block, latest when no height is given
    Block { height: Option<String> },
    /// Every indexed transaction, newest first
    Txs,
    /// Accounts with their balances
    Accounts,
}

fn parse_height(raw: Option<String>) -> chainview::Result<Option<ChainHeight>> {
    raw.map(|h| ChainHeight::parse(&h)).transpose()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    cli::init_tracing(args.verbose);

    let mut config = load_config_from(&args.config)?;
    if let Some(url) = args.rpc_url {
        config.endpoints.rpc_url = url;
    }
    if let Some(url) = args.rest_url {
        config.endpoints.rest_url = url;
    }
    config.validate()?;

    let request = RefreshRequest::from_config(&config.endpoints)?;
    let fetcher = HttpFetcher::new(config.client.timeout()?)?;
    let rpc = RpcClient::new(fetcher.clone(), request.rpc.clone());
    let rest = RestClient::new(fetcher.clone(), request.rest.clone());

    match args.command.unwrap_or(Command::Refresh { height: None }) {
        Command::Refresh { height } => {
            let aggregator = Aggregator::new(fetcher, config.search, config.accounts);
            let snapshot = aggregator
                .refresh(request.with_height(parse_height(height)?))
                .await?;
            cli::print_snapshot(&snapshot);
        }
        Command::Height => {
            cli::print_height(&outcome(rpc.resolve_latest_height().await));
        }
        Command::Block { height } => {
            let height = parse_height(height)?;
            cli::print_block(&outcome(rpc.fetch_block(height.as_ref()).await), None);
        }
        Command::Txs => {
            cli::print_transactions(&outcome(rpc.search_transactions(&config.search).await));
        }
        Command::Accounts => {
            cli::print_accounts(&outcome(rest.enrich_accounts(&config.accounts).await));
        }
    }

    Ok(())
}

fn outcome<T>(result: chainview::Result<T>) -> StageOutcome<T> {
    match result {
        Ok(value) => StageOutcome::Ready { value },
        Err(err) => StageOutcome::Failed {
            error: (&err).into(),
        },
    }
}
