use std::collections::{HashMap, HashSet};

/// Latest mark price per tracked symbol, fed by the price stream.
#[derive(Debug, Clone, Default)]
pub struct PriceFeed {
    tracked: HashSet<String>,
    prices: HashMap<String, f64>,
}

impl PriceFeed {
    pub fn new(symbols: &[String]) -> Self {
        Self {
            tracked: symbols.iter().cloned().collect(),
            prices: HashMap::new(),
        }
    }

    /// Record a tick. Returns `false` (and changes nothing) for untracked
    /// symbols and non-positive or non-finite prices.
    pub fn apply(&mut self, symbol: &str, price: f64) -> bool {
        if !self.tracked.contains(symbol) || !price.is_finite() || price <= 0.0 {
            return false;
        }
        self.prices.insert(symbol.to_string(), price);
        true
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}
