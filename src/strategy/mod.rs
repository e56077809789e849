use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::TradeConfig;
use crate::pi42::types::OrderSide;
use crate::risk::round_to;

/// Which way the deployment trades. Every side-dependent rule hangs off this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sell to open; resting BUY orders mark where to add.
    Short,
    /// Buy to open; resting SELL orders mark where to add.
    Long,
}

impl Direction {
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Direction::Short => OrderSide::Sell,
            Direction::Long => OrderSide::Buy,
        }
    }

    pub fn accumulation_side(&self) -> OrderSide {
        match self {
            Direction::Short => OrderSide::Buy,
            Direction::Long => OrderSide::Sell,
        }
    }

    /// Add-on trigger from the reference accumulation price, rounded to cents.
    pub fn trigger_price(&self, reference: f64, rise_percent: f64) -> f64 {
        let raw = match self {
            Direction::Short => reference * (1.0 + rise_percent / 100.0),
            Direction::Long => reference * (1.0 - rise_percent / 100.0),
        };
        round_to(raw, 2)
    }

    /// Has the price moved far enough in our favour to add?
    pub fn is_triggered(&self, price: f64, trigger: f64) -> bool {
        match self {
            Direction::Short => price >= trigger,
            Direction::Long => price <= trigger,
        }
    }

    pub fn take_profit(&self, entry_price: f64, take_profit_percent: f64) -> f64 {
        match self {
            Direction::Short => entry_price * (1.0 - take_profit_percent / 100.0),
            Direction::Long => entry_price * (1.0 + take_profit_percent / 100.0),
        }
    }

    pub fn unrealised_pnl(&self, entry_price: f64, price: f64, quantity: f64) -> f64 {
        match self {
            Direction::Short => (entry_price - price) * quantity,
            Direction::Long => (price - entry_price) * quantity,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Short => write!(f, "SHORT"),
            Direction::Long => write!(f, "LONG"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymbolPhase {
    Idle,
    CoolingDown { remaining: Duration },
    /// Last submission failed; short backoff before retrying.
    RetryBackoff { remaining: Duration },
}

/// Per-symbol record of the last accepted submission (and last failure).
#[derive(Debug, Clone)]
pub struct CooldownClock {
    cooldown: Duration,
    failure_backoff: Duration,
    last_trade: HashMap<String, Instant>,
    last_failure: HashMap<String, Instant>,
}

impl CooldownClock {
    pub fn new(cooldown: Duration, failure_backoff: Duration) -> Self {
        Self {
            cooldown,
            failure_backoff,
            last_trade: HashMap::new(),
            last_failure: HashMap::new(),
        }
    }

    /// Leaving the cooldown is purely a function of elapsed time.
    pub fn phase(&self, symbol: &str, now: Instant) -> SymbolPhase {
        if let Some(last) = self.last_trade.get(symbol) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.cooldown {
                return SymbolPhase::CoolingDown { remaining: self.cooldown - elapsed };
            }
        }
        if let Some(failed) = self.last_failure.get(symbol) {
            let elapsed = now.saturating_duration_since(*failed);
            if elapsed < self.failure_backoff {
                return SymbolPhase::RetryBackoff { remaining: self.failure_backoff - elapsed };
            }
        }
        SymbolPhase::Idle
    }

    pub fn record_success(&mut self, symbol: &str, now: Instant) {
        self.last_trade.insert(symbol.to_string(), now);
        self.last_failure.remove(symbol);
    }

    pub fn record_failure(&mut self, symbol: &str, now: Instant) {
        self.last_failure.insert(symbol.to_string(), now);
    }

    pub fn last_trade(&self, symbol: &str) -> Option<Instant> {
        self.last_trade.get(symbol).copied()
    }
}

/// Everything the decision needs about one symbol at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketView {
    pub price: Option<f64>,
    /// False until the first positions poll lands.
    pub positions_known: bool,
    pub has_position: bool,
    /// Best accumulation-side resting price, if any.
    pub reference_price: Option<f64>,
    pub phase: SymbolPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPrice,
    /// No positions snapshot yet, so "flat" can't be told from "unknown".
    AwaitingPositions,
    CoolingDown,
    RetryBackoff,
    NoSeedOrder,
    NoTrigger,
    BelowTrigger,
    /// Capital doesn't cover one quantity step at the current price.
    NoQuantity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Skip(SkipReason),
    /// First entry: no position on the book.
    Open { price: f64 },
    /// Averaging in after the price crossed the trigger.
    AddOn { price: f64, trigger: f64 },
}

impl Decision {
    pub fn is_submit(&self) -> bool {
        !matches!(self, Decision::Skip(_))
    }
}

/// Stateless decision rules over a `MarketView`.
#[derive(Debug, Clone)]
pub struct TradeDecisionEngine {
    config: Arc<TradeConfig>,
}

impl TradeDecisionEngine {
    pub fn new(config: Arc<TradeConfig>) -> Self {
        Self { config }
    }

    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    pub fn trigger_price(&self, reference_price: Option<f64>) -> Option<f64> {
        reference_price.map(|r| self.config.direction.trigger_price(r, self.config.rise_percent))
    }

    pub fn evaluate(&self, view: &MarketView) -> Decision {
        let Some(price) = view.price else {
            return Decision::Skip(SkipReason::NoPrice);
        };

        if !view.positions_known {
            return Decision::Skip(SkipReason::AwaitingPositions);
        }

        match view.phase {
            SymbolPhase::CoolingDown { .. } => return Decision::Skip(SkipReason::CoolingDown),
            SymbolPhase::RetryBackoff { .. } => return Decision::Skip(SkipReason::RetryBackoff),
            SymbolPhase::Idle => {}
        }

        if !view.has_position {
            if self.config.require_seed_order && view.reference_price.is_none() {
                return Decision::Skip(SkipReason::NoSeedOrder);
            }
            return Decision::Open { price };
        }

        let Some(trigger) = self.trigger_price(view.reference_price) else {
            return Decision::Skip(SkipReason::NoTrigger);
        };

        if self.config.direction.is_triggered(price, trigger) {
            Decision::AddOn { price, trigger }
        } else {
            Decision::Skip(SkipReason::BelowTrigger)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(direction: Direction, require_seed_order: bool) -> Arc<TradeConfig> {
        Arc::new(TradeConfig {
            symbols: vec!["X".to_string()],
            capital_per_trade: 1000.0,
            rise_percent: 3.0,
            take_profit_percent: 1.0,
            cooldown_secs: 20,
            failure_backoff_secs: 5,
            direction,
            margin_asset: "INR".to_string(),
            require_seed_order,
            min_qty: HashMap::new(),
            default_min_qty: 0.001,
            quantity_precision: 3,
            price_precision: 2,
            place_type: "ORDER_FORM".to_string(),
            device_type: "WEB".to_string(),
            user_category: "EXTERNAL".to_string(),
        })
    }

    fn view(price: Option<f64>, has_position: bool, reference_price: Option<f64>) -> MarketView {
        MarketView { price, positions_known: true, has_position, reference_price, phase: SymbolPhase::Idle }
    }

    #[test]
    fn test_direction_rules_mirror() {
        assert_eq!(Direction::Short.entry_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.accumulation_side(), OrderSide::Buy);
        assert_eq!(Direction::Long.entry_side(), OrderSide::Buy);
        assert_eq!(Direction::Long.accumulation_side(), OrderSide::Sell);

        assert_eq!(Direction::Short.trigger_price(95.0, 3.0), 97.85);
        assert_eq!(Direction::Long.trigger_price(100.0, 3.0), 97.0);

        assert!(Direction::Short.is_triggered(97.85, 97.85));
        assert!(!Direction::Short.is_triggered(97.0, 97.85));
        assert!(Direction::Long.is_triggered(96.0, 97.0));
        assert!(!Direction::Long.is_triggered(98.0, 97.0));

        assert_eq!(Direction::Short.unrealised_pnl(100.0, 98.0, 2.0), 4.0);
        assert_eq!(Direction::Long.unrealised_pnl(100.0, 98.0, 2.0), -4.0);
    }

    #[test]
    fn test_no_price_is_noop() {
        let engine = TradeDecisionEngine::new(config(Direction::Short, false));
        assert_eq!(engine.evaluate(&view(None, false, None)), Decision::Skip(SkipReason::NoPrice));
    }

    #[test]
    fn test_no_entry_before_positions_known() {
        let engine = TradeDecisionEngine::new(config(Direction::Short, false));
        let mut v = view(Some(100.0), false, Some(95.0));
        v.positions_known = false;
        assert_eq!(engine.evaluate(&v), Decision::Skip(SkipReason::AwaitingPositions));
    }

    #[test]
    fn test_first_entry_ignores_orderbook() {
        let engine = TradeDecisionEngine::new(config(Direction::Short, false));
        assert_eq!(engine.evaluate(&view(Some(100.0), false, None)), Decision::Open { price: 100.0 });
        assert_eq!(engine.evaluate(&view(Some(100.0), false, Some(200.0))), Decision::Open { price: 100.0 });
    }

    #[test]
    fn test_seed_order_required_when_configured() {
        let engine = TradeDecisionEngine::new(config(Direction::Short, true));
        assert_eq!(
            engine.evaluate(&view(Some(100.0), false, None)),
            Decision::Skip(SkipReason::NoSeedOrder)
        );
        assert_eq!(engine.evaluate(&view(Some(100.0), false, Some(95.0))), Decision::Open { price: 100.0 });
    }

    #[test]
    fn test_add_on_needs_trigger_cross() {
        let engine = TradeDecisionEngine::new(config(Direction::Short, false));

        assert_eq!(
            engine.evaluate(&view(Some(98.0), true, None)),
            Decision::Skip(SkipReason::NoTrigger)
        );
        assert_eq!(
            engine.evaluate(&view(Some(98.0), true, Some(95.0))),
            Decision::AddOn { price: 98.0, trigger: 97.85 }
        );
        assert_eq!(
            engine.evaluate(&view(Some(97.0), true, Some(95.0))),
            Decision::Skip(SkipReason::BelowTrigger)
        );
    }

    #[test]
    fn test_long_add_on_mirrors() {
        let engine = TradeDecisionEngine::new(config(Direction::Long, false));
        assert!(engine.evaluate(&view(Some(96.0), true, Some(100.0))).is_submit());
        assert!(!engine.evaluate(&view(Some(98.0), true, Some(100.0))).is_submit());
    }

    #[test]
    fn test_cooldown_blocks_everything() {
        let engine = TradeDecisionEngine::new(config(Direction::Short, false));
        let mut v = view(Some(100.0), false, None);
        v.phase = SymbolPhase::CoolingDown { remaining: Duration::from_secs(3) };
        assert_eq!(engine.evaluate(&v), Decision::Skip(SkipReason::CoolingDown));

        v.phase = SymbolPhase::RetryBackoff { remaining: Duration::from_secs(1) };
        assert_eq!(engine.evaluate(&v), Decision::Skip(SkipReason::RetryBackoff));
    }

    #[test]
    fn test_cooldown_clock_elapses() {
        let mut clock = CooldownClock::new(Duration::from_secs(20), Duration::from_secs(5));
        let t0 = Instant::now();

        assert_eq!(clock.phase("X", t0), SymbolPhase::Idle);

        clock.record_success("X", t0);
        assert_eq!(
            clock.phase("X", t0 + Duration::from_secs(1)),
            SymbolPhase::CoolingDown { remaining: Duration::from_secs(19) }
        );
        assert_eq!(clock.phase("X", t0 + Duration::from_secs(20)), SymbolPhase::Idle);
        assert_eq!(clock.phase("Y", t0), SymbolPhase::Idle);
    }

    #[test]
    fn test_failure_backoff_does_not_start_cooldown() {
        let mut clock = CooldownClock::new(Duration::from_secs(20), Duration::from_secs(5));
        let t0 = Instant::now();

        clock.record_failure("X", t0);
        assert!(matches!(clock.phase("X", t0 + Duration::from_secs(2)), SymbolPhase::RetryBackoff { .. }));
        assert_eq!(clock.phase("X", t0 + Duration::from_secs(5)), SymbolPhase::Idle);
        assert_eq!(clock.last_trade("X"), None);
    }
}
