mod config;
mod data;
mod error;
mod execution;
mod monitoring;
mod orchestrator;
mod strategies;

use anyhow::Result;
use clap::Parser;
use config::{Config, EnvConfig};
use execution::sink::LoggingSink;
use orchestrator::{Orchestrator, Sources};
use strategies::fusion::FusionEngine;

/// Fuse options flow, social sentiment and fundamentals into BUY/SELL/HOLD
/// recommendations. Never places orders.
#[derive(Debug, Parser)]
#[command(name = "signal-fusion", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log the orders a signal implies, even with broker credentials set
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Comma separated ticker symbols (overrides WATCHLIST and the config file)
    #[arg(long)]
    symbols: Option<String>,

    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "SIGNAL_FUSION_CONFIG")]
    config: String,

    /// Shares per implied order
    #[arg(long, default_value_t = execution::sink::DEFAULT_QUANTITY)]
    quantity: u32,

    /// Use fallback data for every source; no network access
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    monitoring::logger::init_tracing(cli.verbose);

    tracing::info!("Loading configuration...");
    let env_config = EnvConfig::load()?;
    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env(&env_config)?;

    let dry_run = cli.dry_run || config.system.dry_run;
    tracing::info!("Dry run mode: {}", dry_run);
    tracing::info!(
        "Thresholds: flow multiple {:.2}x, sentiment {:.2}, P/E ceiling {:.1}",
        config.strategy.flow_multiple,
        config.strategy.sentiment_threshold,
        config.strategy.pe_ceiling
    );

    let watchlist = config.resolve_watchlist(cli.symbols.as_deref());
    if watchlist.is_empty() {
        tracing::warn!("Watchlist is empty, nothing to do");
        return Ok(());
    }

    let sources = Sources::select(&config, &env_config, cli.offline)?;
    let engine = FusionEngine::new(config.strategy);
    let sink = LoggingSink::new(
        dry_run,
        env_config.broker_configured(),
        env_config.broker_paper,
    )
    .with_quantity(cli.quantity);

    Orchestrator::new(sources, engine, sink).run(&watchlist).await;

    Ok(())
}
