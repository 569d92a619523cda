//! Command-line commands
//!
//! Each command prints one pretty JSON document to stdout. `watch` keeps the
//! client connected so the renewal scheduler can keep the cached session
//! alive for other processes, and exits on SIGINT/SIGTERM.

use anyhow::{Result, bail};
use etrade_api::{Client, DEFAULT_ORDER_COUNT};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    Open,
    Executed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Accounts,
    Balance,
    Positions,
    Quote(Vec<String>),
    Orders(OrderFilter),
    Watch,
}

pub const USAGE: &str = "usage: etrader [--config PATH] <accounts|balance|positions|quote SYMBOL..|orders [open|executed]|watch>";

impl Command {
    /// Parse the arguments after the program name. `--config PATH` may
    /// appear anywhere and is skipped here.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "--config" {
                iter.next();
                continue;
            }
            positional.push(arg.as_str());
        }

        let Some((name, rest)) = positional.split_first() else {
            bail!("missing command\n{USAGE}");
        };
        let command = match (*name, rest) {
            ("accounts", []) => Command::Accounts,
            ("balance", []) => Command::Balance,
            ("positions", []) => Command::Positions,
            ("quote", []) => bail!("quote needs at least one symbol\n{USAGE}"),
            ("quote", symbols) => {
                Command::Quote(symbols.iter().map(|s| s.to_uppercase()).collect())
            }
            ("orders", []) => Command::Orders(OrderFilter::All),
            ("orders", ["open"]) => Command::Orders(OrderFilter::Open),
            ("orders", ["executed"]) => Command::Orders(OrderFilter::Executed),
            ("watch", []) => Command::Watch,
            _ => bail!("unrecognized command: {}\n{USAGE}", positional.join(" ")),
        };
        Ok(command)
    }

    /// Label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Accounts => "accounts",
            Command::Balance => "balance",
            Command::Positions => "positions",
            Command::Quote(_) => "quote",
            Command::Orders(_) => "orders",
            Command::Watch => "watch",
        }
    }
}

/// Run a command against a connected client.
pub async fn run(command: &Command, client: &Client) -> Result<()> {
    match command {
        Command::Accounts => print(&client.accounts().await),
        Command::Balance => print(&client.account_balance(None).await?),
        Command::Positions => print(&client.account_positions(None).await?),
        Command::Quote(symbols) => {
            let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
            print(&client.quote(&symbols).await?)
        }
        Command::Orders(filter) => {
            let orders = match filter {
                OrderFilter::All => client.list_orders(DEFAULT_ORDER_COUNT).await?,
                OrderFilter::Open => client.list_open_orders(DEFAULT_ORDER_COUNT).await?,
                OrderFilter::Executed => client.list_executed_orders(DEFAULT_ORDER_COUNT).await?,
            };
            print(&orders)
        }
        Command::Watch => {
            info!("session active, waiting for shutdown signal");
            crate::shutdown_signal().await;
            Ok(())
        }
    }
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
