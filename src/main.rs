//! DCA Safety Bot - Main Entry Point
//!
//! Trades the configured spot pairs on a fixed tick and serves a liveness
//! endpoint alongside.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dca_safety_bot::common::traits::Notifier;
use dca_safety_bot::config::load_config;
use dca_safety_bot::{
    health, BinanceClient, IndicatorSettings, KlineSignalSource, LogNotifier, TelegramNotifier,
    TradingController,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let started_at = Instant::now();
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config)).context("failed to load configuration")?;

    // Initialize logging
    let log_level = args.log_level.unwrap_or_else(|| config.settings.log_level.clone());
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting DCA safety bot");
    info!("Configuration file: {}", args.config);

    let strategy = &config.strategy;
    let pairs = strategy.parsed_pairs()?;
    let timeout = Duration::from_secs(config.settings.request_timeout_seconds);

    if config.exchange.api_key.is_none() || config.exchange.api_secret.is_none() {
        warn!("No exchange credentials configured; order placement will fail");
    }
    let exchange = Arc::new(BinanceClient::new(&config.exchange, timeout)?);
    exchange
        .load_markets(&pairs)
        .await
        .context("failed to load market rules")?;

    let signals = Arc::new(KlineSignalSource::new(
        exchange.rest().clone(),
        IndicatorSettings::from_config(strategy),
    ));

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram, timeout)?),
        None => {
            warn!("Telegram not configured, notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let mut controller = TradingController::from_config(strategy, signals, exchange, notifier)?;

    info!(
        pairs = ?pairs.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        mode = %strategy.take_profit_mode,
        profit_target = %strategy.profit_target,
        "Strategy configured"
    );
    for step in controller.planner().ladder() {
        info!(
            sequence_number = step.sequence_number,
            drop = %step.drop_fraction,
            amount = %step.amount,
            "Safety order rung"
        );
    }

    let addr: SocketAddr = config
        .settings
        .health_bind_addr
        .parse()
        .with_context(|| format!("invalid health_bind_addr {}", config.settings.health_bind_addr))?;
    tokio::spawn(async move {
        if let Err(err) = health::serve(addr, started_at).await {
            error!(error = %err, "Liveness endpoint stopped");
        }
    });

    controller.reconcile().await;

    let interval = Duration::from_secs(config.settings.tick_interval_seconds);
    controller
        .run(interval, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Received shutdown signal, cleaned up");
    Ok(())
}
