//! Timer-driven refresh of open orders and positions. A failed poll logs and
//! sends nothing, so the engine keeps its previous snapshot; the next tick is
//! the retry.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::EngineEvent;
use crate::execution::ExchangeApi;

/// One open-orders cycle. Returns `false` once the engine has gone away.
pub async fn poll_orders_once<E: ExchangeApi>(
    api: &E,
    symbols: &[String],
    tx: &mpsc::Sender<EngineEvent>,
) -> bool {
    for symbol in symbols {
        match api.open_orders(symbol).await {
            Ok(orders) => {
                let event = EngineEvent::OpenOrders {
                    symbol: symbol.clone(),
                    orders,
                };
                if tx.send(event).await.is_err() {
                    return false;
                }
            }
            Err(e) => warn!(symbol = %symbol, "Order error: {}", e),
        }
    }
    true
}

/// One positions cycle. Returns `false` once the engine has gone away.
pub async fn poll_positions_once<E: ExchangeApi>(api: &E, tx: &mpsc::Sender<EngineEvent>) -> bool {
    match api.open_positions().await {
        Ok(positions) => tx.send(EngineEvent::Positions(positions)).await.is_ok(),
        Err(e) => {
            warn!("Position error: {}", e);
            true
        }
    }
}

pub async fn run_order_poller<E: ExchangeApi>(
    api: Arc<E>,
    symbols: Vec<String>,
    interval: Duration,
    tx: mpsc::Sender<EngineEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if !poll_orders_once(api.as_ref(), &symbols, &tx).await {
            return;
        }
    }
}

pub async fn run_position_poller<E: ExchangeApi>(
    api: Arc<E>,
    interval: Duration,
    tx: mpsc::Sender<EngineEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if !poll_positions_once(api.as_ref(), &tx).await {
            return;
        }
    }
}
