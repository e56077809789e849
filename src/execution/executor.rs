use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ExchangeApi;
use crate::config::TradeConfig;
use crate::error::ExchangeError;
use crate::pi42::auth::AccountSigner;
use crate::pi42::types::{OrderSide, PlaceOrderRequest};
use crate::risk::round_to;

/// Builds, signs and submits market orders with an attached take-profit.
pub struct OrderExecutor<E: ExchangeApi> {
    api: Arc<E>,
    config: Arc<TradeConfig>,
    timeout: Duration,
}

impl<E: ExchangeApi> OrderExecutor<E> {
    pub fn new(api: Arc<E>, config: Arc<TradeConfig>, timeout: Duration) -> Self {
        Self { api, config, timeout }
    }

    /// Take-profit below entry for shorts, above for longs, at venue price precision.
    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        round_to(
            self.config
                .direction
                .take_profit(entry_price, self.config.take_profit_percent),
            self.config.price_precision,
        )
    }

    pub fn build_request(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        entry_price: f64,
        timestamp: i64,
    ) -> PlaceOrderRequest {
        PlaceOrderRequest {
            timestamp: timestamp.to_string(),
            place_type: self.config.place_type.clone(),
            quantity,
            side,
            price: 0,
            symbol: symbol.to_string(),
            order_type: "MARKET".to_string(),
            reduce_only: false,
            margin_asset: self.config.margin_asset.clone(),
            device_type: self.config.device_type.clone(),
            user_category: self.config.user_category.clone(),
            take_profit_price: self.take_profit_price(entry_price),
        }
    }

    /// Submit one order. `true` means the transport accepted the request,
    /// not that it filled. Every failure is logged and reported as `false`.
    pub async fn submit(&self, symbol: &str, side: OrderSide, quantity: f64, entry_price: f64) -> bool {
        let request = self.build_request(symbol, side, quantity, entry_price, AccountSigner::timestamp());

        let result = match tokio::time::timeout(self.timeout, self.api.place_order(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(self.timeout)),
        };

        match result {
            Ok(ack) => {
                info!(
                    symbol = %symbol,
                    side = %side,
                    qty = quantity,
                    entry = entry_price,
                    tp = request.take_profit_price,
                    "📤 Order accepted ({}): {}",
                    ack.status,
                    ack.body
                );
                true
            }
            Err(e) => {
                warn!(symbol = %symbol, side = %side, qty = quantity, "❌ Order failed: {}", e);
                false
            }
        }
    }
}
