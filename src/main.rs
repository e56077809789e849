use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pi42_entry_bot::config::Config;
use pi42_entry_bot::dashboard::run_dashboard;
use pi42_entry_bot::engine::TradingEngine;
use pi42_entry_bot::execution::{OrderExecutor, Pi42Client};
use pi42_entry_bot::pi42::{AccountSigner, MarkPriceStream};
use pi42_entry_bot::polling::{run_order_poller, run_position_poller};

const EVENT_QUEUE: usize = 1024;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("🚀 Pi42 Entry Bot - Starting...");

    // Configuration problems are fatal before any loop starts
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };
    let trading = Arc::new(config.trading.clone());

    info!("✅ Configuration loaded");
    info!("   Symbols: {:?}", trading.symbols);
    info!("   Direction: {} | Capital/trade: {} {}", trading.direction, trading.capital_per_trade, trading.margin_asset);
    info!("   Rise: {}% | TP: {}% | Cooldown: {}s | Seed order required: {}",
        trading.rise_percent, trading.take_profit_percent, trading.cooldown_secs, trading.require_seed_order);

    let (api_key, api_secret) = config.exchange.credentials()?;
    let signer = AccountSigner::new(api_key, api_secret);

    let client = Arc::new(Pi42Client::new(
        config.exchange.rest_url.clone(),
        signer,
        config.exchange.request_timeout(),
    )?);
    info!("✅ REST client initialized");

    let executor = OrderExecutor::new(client.clone(), trading.clone(), config.exchange.request_timeout());
    let engine = TradingEngine::new(trading.clone(), executor);
    let snapshot = engine.snapshot();

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);

    let engine_task = tokio::spawn(engine.run(rx));

    let positions_task = tokio::spawn(run_position_poller(
        client.clone(),
        Duration::from_secs(config.polling.positions_interval_secs),
        tx.clone(),
    ));

    let orders_task = tokio::spawn(run_order_poller(
        client.clone(),
        trading.symbols.clone(),
        Duration::from_secs(config.polling.orders_interval_secs),
        tx.clone(),
    ));

    let stream = MarkPriceStream::new(
        config.exchange.ws_url.clone(),
        trading.symbols.clone(),
        config.exchange.reconnect_delay(),
    );
    let stream_task = tokio::spawn(stream.run(tx));

    let dashboard_task = tokio::spawn(run_dashboard(
        snapshot,
        trading.direction,
        Duration::from_secs(config.polling.dashboard_interval_secs),
    ));

    info!("✅ All tasks started");

    tokio::select! {
        result = engine_task => {
            if let Err(e) = result {
                warn!("Engine task error: {}", e);
            }
        }
        result = stream_task => {
            if let Err(e) = result {
                warn!("Price stream task error: {}", e);
            }
        }
        result = positions_task => {
            if let Err(e) = result {
                warn!("Position poller error: {}", e);
            }
        }
        result = orders_task => {
            if let Err(e) = result {
                warn!("Order poller error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    dashboard_task.abort();
    info!("👋 Bot stopped");
    Ok(())
}
