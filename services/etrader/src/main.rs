//! etrader
//!
//! Command-line client for the E*TRADE API:
//! 1. Loads configuration and consumer credentials
//! 2. Authorizes, reusing the cached session when the provider still accepts it
//! 3. Runs one command, printing JSON to stdout
//! 4. Closes the client (revoking the token when session caching is off)

mod commands;
mod config;
mod metrics;

use std::time::Instant;

use anyhow::{Context, Result};
use etrade_api::Client;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Command, USAGE};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so stdout stays parseable; LOG_LEVEL / RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }
    let command = Command::parse(&args)?;
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        environment = ?config.etrade.environment,
        base_url = %config.endpoints().base_url(),
        use_cached_session = config.etrade.use_cached_session,
        cache_path = %config.etrade.cache_path.display(),
        "configuration loaded"
    );

    if let Some(addr) = config.metrics.listen_addr {
        metrics::install_exporter(addr)
            .with_context(|| format!("failed to start metrics exporter on {addr}"))?;
        info!(%addr, "metrics exporter listening");
    }

    let settings = config.client_settings()?;
    let client = Client::connect(settings, config.verifier())
        .await
        .context("failed to connect to E*TRADE")?;

    let started = Instant::now();
    let result = commands::run(&command, &client).await;
    metrics::record_command(
        command.name(),
        result.is_ok(),
        started.elapsed().as_secs_f64(),
    );
    if let Err(ref e) = result {
        error!(command = command.name(), error = %e, "command failed");
    }

    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to close client cleanly");
    }
    info!("shutdown complete");
    result
}

/// Wait for SIGTERM or SIGINT.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
