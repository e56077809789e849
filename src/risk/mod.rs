//! Order sizing: fixed capital per trade converted into a venue-legal quantity.

use std::sync::Arc;

use crate::config::TradeConfig;

/// Tolerance applied before flooring so that e.g. `0.009 / 0.003` counts as 3 steps.
const STEP_EPSILON: f64 = 1e-9;

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Whole number of `step`s affordable with `capital` at `price`, as a quantity.
///
/// `None` when the price is not positive or less than one step is affordable.
pub fn size_order(capital: f64, price: f64, step: f64, precision: u32) -> Option<f64> {
    if !(price > 0.0) || !(step > 0.0) || !price.is_finite() {
        return None;
    }

    let steps = (capital / price / step + STEP_EPSILON).floor();
    if steps < 1.0 {
        return None;
    }

    Some(round_to(steps * step, precision))
}

/// Pure sizing against the deployment's `TradeConfig`.
#[derive(Debug, Clone)]
pub struct OrderSizer {
    config: Arc<TradeConfig>,
}

impl OrderSizer {
    pub fn new(config: Arc<TradeConfig>) -> Self {
        Self { config }
    }

    /// Quantity for the next order on `symbol`, or `None` if the price is
    /// unknown or the capital doesn't cover one step.
    pub fn quantity(&self, symbol: &str, price: Option<f64>) -> Option<f64> {
        size_order(
            self.config.capital_per_trade,
            price?,
            self.config.step(symbol),
            self.config.quantity_precision,
        )
    }
}
