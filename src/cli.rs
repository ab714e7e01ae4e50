//! Terminal rendering shared by the binaries

use crate::aggregator::{Snapshot, StageOutcome};
use crate::types::{AccountList, Block, ChainHeight, Transaction, TransactionSet};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "chainview=debug" } else { "chainview=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `abcdef…uvwxyz` for values longer than `2 * keep` characters.
pub fn shorten(value: &str, keep: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= keep * 2 {
        return value.to_string();
    }
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}…{}", head, tail)
}

pub fn result_label(tx: &Transaction) -> String {
    if tx.is_success() {
        "Success".to_string()
    } else {
        format!("Error {}", tx.result_code)
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| {
            Cell::new(title)
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold)
        })
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn block_table(block: &Block, tx_total: Option<u64>) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Field", "Value"]));
    let rows = [
        ("Chain ID", block.chain_id.clone()),
        ("Height", block.height.to_string()),
        ("Time", block.timestamp.to_rfc3339()),
        ("Block hash", block.hash.clone()),
        ("Proposer", block.proposer_address.clone()),
        ("Txs in block", block.transaction_count.to_string()),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field).fg(TableColor::Grey), Cell::new(value)]);
    }
    if let Some(total) = tx_total {
        table.add_row(vec![
            Cell::new("Indexed txs").fg(TableColor::Grey),
            Cell::new(total.to_string()),
        ]);
    }
    table
}

pub fn transactions_table(set: &TransactionSet) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Hash", "Height", "Result", "Gas", "Log"]));
    for tx in &set.transactions {
        let color = if tx.is_success() {
            TableColor::Green
        } else {
            TableColor::Red
        };
        table.add_row(vec![
            Cell::new(shorten(&tx.hash, 10)),
            Cell::new(format!("#{}", tx.height)),
            Cell::new(result_label(tx)).fg(color),
            Cell::new(format!("{}/{}", tx.gas_used, tx.gas_wanted)),
            Cell::new(shorten(&tx.log, 30)).fg(TableColor::Grey),
        ]);
    }
    table
}

pub fn accounts_table(list: &AccountList) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Address", "Type", "Balances"]));
    for account in &list.accounts {
        let balances = if account.degraded {
            Cell::new("no balances (lookup failed)").fg(TableColor::Yellow)
        } else if account.balances.is_empty() {
            Cell::new("no balances").fg(TableColor::Grey)
        } else {
            let text: Vec<String> = account
                .balances
                .iter()
                .map(|b| format!("{} {}", b.amount, b.denom))
                .collect();
            Cell::new(text.join("\n"))
        };
        table.add_row(vec![
            Cell::new(shorten(&account.address, 14)),
            Cell::new(account.short_type()).fg(TableColor::Magenta),
            balances,
        ]);
    }
    table
}

/// Prints a stage error or skip reason; returns the value when ready.
pub fn print_stage<'a, T>(title: &str, stage: &'a StageOutcome<T>) -> Option<&'a T> {
    println!("{}", format!("━━ {} ━━", title).bright_cyan().bold());
    match stage {
        StageOutcome::Ready { value } => Some(value),
        StageOutcome::Failed { error } => {
            eprintln!("{} {}", "❌".red(), error.message.red());
            None
        }
        StageOutcome::Skipped { reason } => {
            println!("{}", reason.yellow());
            None
        }
    }
}

pub fn print_height(stage: &StageOutcome<ChainHeight>) {
    if let Some(height) = print_stage("Latest height", stage) {
        println!("{}", height.to_string().bright_white().bold());
    }
}

pub fn print_block(stage: &StageOutcome<Block>, tx_total: Option<u64>) {
    if let Some(block) = print_stage("Block", stage) {
        println!("{}", block_table(block, tx_total));
    }
}

pub fn print_transactions(stage: &StageOutcome<TransactionSet>) {
    if let Some(set) = print_stage("Transactions", stage) {
        println!(
            "{}",
            format!(
                "Total: {} ({} page(s), query {} order_by {})",
                set.total_count, set.pages_fetched, set.query, set.order_by
            )
            .cyan()
        );
        if set.transactions.is_empty() {
            println!("{}", "No transactions".yellow());
        } else {
            println!("{}", transactions_table(set));
        }
    }
}

pub fn print_accounts(stage: &StageOutcome<AccountList>) {
    if let Some(list) = print_stage("Accounts", stage) {
        println!("{}", format!("{} account(s)", list.accounts.len()).cyan());
        if let Some(notice) = list.partial_enrichment() {
            println!("{}", notice.to_string().yellow());
        }
        if list.truncated {
            println!("{}", "More accounts exist beyond the page limit".yellow());
        }
        if !list.accounts.is_empty() {
            println!("{}", accounts_table(list));
        }
    }
}

pub fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "{}",
        format!(
            "Cycle {} · RPC {} · REST {}",
            snapshot.cycle, snapshot.rpc_url, snapshot.rest_url
        )
        .bright_magenta()
    );
    print_height(&snapshot.height);
    let tx_total = snapshot.transactions.value().map(|set| set.total_count);
    print_block(&snapshot.block, tx_total);
    print_transactions(&snapshot.transactions);
    print_accounts(&snapshot.accounts);
}
