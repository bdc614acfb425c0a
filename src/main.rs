//! Auction Coordinator - Dutch-auction order broadcasting and resolver price discovery
//!
//! The `registry` process holds broadcast auctions behind a small JSON API.
//! The `resolver` process polls it, prices each auction on its linear decay
//! curve and decides once per order whether to bid.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

mod api;
mod config;
mod error;
mod metrics;
mod model;
mod registry;
mod resolver;

use config::Settings;
use error::NetworkErrorKind;
use metrics::MetricsServer;
use model::{AuctionData, BroadcastRequest, DecayCurve};
use registry::AuctionStore;
use resolver::{BidAction, BidStrategy, HttpRegistryClient, RegistryClient, ThresholdStrategy};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to $AUCTION_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the auction registry HTTP server
    Registry,
    /// Run a resolver against a registry
    Resolver {
        /// Registry base URL, overriding resolver.server_url
        #[arg(long, env = "AUCTION_SERVER_URL")]
        server_url: Option<String>,
    },
    /// Print the current decayed price of one auction
    Price {
        order_id: String,
        /// Evaluate at this unix time (seconds) instead of now
        #[arg(long)]
        at: Option<u128>,
    },
    /// Broadcast a JSON auction payload file to the registry
    Broadcast { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();

    // Load configuration
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Registry => run_registry(settings).await,
        Command::Resolver { server_url } => {
            if let Some(url) = server_url {
                settings.resolver.server_url = url;
            }
            run_resolver(settings).await
        }
        Command::Price { order_id, at } => price_check(&settings, &order_id, at).await,
        Command::Broadcast { file } => broadcast_file(&settings, &file).await,
    }
}

async fn run_registry(settings: Settings) -> Result<()> {
    info!("Starting auction registry v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(AuctionStore::new(&settings.registry));
    info!(
        "Validation mode {:?}, auction TTL {}s",
        settings.registry.validation, settings.registry.auction_ttl_secs
    );

    let compaction_handle = if settings.registry.compaction_interval_secs > 0 {
        Some(registry::spawn_compaction(
            store.clone(),
            Duration::from_secs(settings.registry.compaction_interval_secs),
        ))
    } else {
        None
    };

    let metrics_handle = spawn_metrics(&settings);

    api::run_server(settings.registry.clone(), store, shutdown_signal()).await?;

    if let Some(h) = compaction_handle {
        h.abort();
    }
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Auction registry stopped");
    Ok(())
}

async fn run_resolver(settings: Settings) -> Result<()> {
    info!("Starting resolver v{}", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(resolver::build_engine(&settings.resolver)?);
    let metrics_handle = spawn_metrics(&settings);

    // Settlement is not wired yet; surface bids where it will plug in
    let mut decisions = engine.subscribe_decisions();
    let decision_handle = tokio::spawn(async move {
        while let Some(decision) = resolver::next_decision(&mut decisions).await {
            if decision.action == BidAction::Bid {
                info!(
                    "Bid triggered for {} at price {:?}",
                    decision.order_id, decision.current_price
                );
            }
        }
    });

    let stop_handle = tokio::spawn({
        let engine = engine.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping...");
            engine.stop().await;
        }
    });

    let result = engine.start().await;

    stop_handle.abort();
    decision_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    result.context("resolver failed")
}

async fn price_check(settings: &Settings, order_id: &str, at: Option<u128>) -> Result<()> {
    let client =
        HttpRegistryClient::new(&settings.resolver.server_url, settings.resolver.request_timeout())?;
    let auction = client.get_auction(order_id).await?;

    let now = at.unwrap_or_else(resolver::decay::unix_now);
    let quote = resolver::decay::quote(&auction, now)?;
    let strategy = ThresholdStrategy::new(settings.resolver.bid_threshold_percent);

    println!("Auction {}", auction.order_id);
    if let Ok(curve) = DecayCurve::from_auction(&auction) {
        println!(
            "  window: {} -> {} ({}s)",
            curve.start_ts,
            curve.end_ts,
            curve.duration()
        );
    }
    println!("  price range: {} -> {}", auction.start_price, auction.end_price);
    println!("  current price: {} ({:?})", quote.price, quote.source);
    if let Some(threshold) = DecayCurve::from_auction(&auction)
        .ok()
        .and_then(|curve| strategy.threshold(curve.start_price))
    {
        println!("  bid threshold: {}", threshold);
    }
    println!(
        "  would bid: {}",
        strategy.should_bid(&auction, quote.price)
    );
    if let Ok(data) = AuctionData::decode(&auction.auction_data) {
        println!("  decay contract: {}", data.decay_contract);
        println!("  extra data: {}", data.extra_data());
    }

    Ok(())
}

async fn broadcast_file(settings: &Settings, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read auction payload: {:?}", file))?;
    let request: BroadcastRequest =
        serde_json::from_str(&raw).with_context(|| "Failed to parse auction payload")?;

    let client =
        HttpRegistryClient::new(&settings.resolver.server_url, settings.resolver.request_timeout())?;

    match client.broadcast(&request).await {
        Ok(response) => {
            println!("Order ID: {}", response.auction_id);
            println!("Check auctions at: {}/auctions", client.base_url());
            println!(
                "Check specific auction: {}/auction/{}",
                client.base_url(),
                response.auction_id
            );
            Ok(())
        }
        Err(e) => {
            if e.network_kind() == Some(NetworkErrorKind::ConnectionRefused) {
                error!(
                    "Registry is not running at {}; start it with `auction-coordinator registry`",
                    client.base_url()
                );
            }
            Err(e).context("Failed to broadcast auction")
        }
    }
}

fn spawn_metrics(settings: &Settings) -> Option<tokio::task::JoinHandle<()>> {
    if !settings.metrics.enabled {
        return None;
    }

    let server = MetricsServer::new(settings.metrics.port);
    info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    Some(tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Metrics server error: {}", e);
        }
    }))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,auction_coordinator=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
