//! The state-owning actor. Price ticks and both pollers feed one channel;
//! every mutation and every decision runs here, one event at a time, so a
//! symbol can never see two submissions race past its cooldown.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::TradeConfig;
use crate::dashboard::{SharedSnapshot, SymbolView};
use crate::execution::{ExchangeApi, OrderExecutor};
use crate::market::PriceFeed;
use crate::orderbook::OrderBookTracker;
use crate::pi42::types::{OpenOrder, OrderSide, Position};
use crate::positions::PositionTracker;
use crate::risk::OrderSizer;
use crate::strategy::{CooldownClock, Decision, MarketView, SkipReason, TradeDecisionEngine};

#[derive(Debug, Clone)]
pub enum EngineEvent {
    MarkPrice { symbol: String, price: f64 },
    /// Fresh open-order snapshot for one symbol.
    OpenOrders { symbol: String, orders: Vec<OpenOrder> },
    /// Fresh open-position snapshot for the whole account.
    Positions(Vec<Position>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Skipped(SkipReason),
    Submitted {
        side: OrderSide,
        quantity: f64,
        price: f64,
        accepted: bool,
    },
}

/// All mutable trading state, owned by the engine.
#[derive(Debug, Clone)]
pub struct TradingState {
    pub prices: PriceFeed,
    pub orders: OrderBookTracker,
    pub positions: PositionTracker,
    pub clock: CooldownClock,
}

impl TradingState {
    pub fn new(config: &TradeConfig) -> Self {
        Self {
            prices: PriceFeed::new(&config.symbols),
            orders: OrderBookTracker::new(config.direction),
            positions: PositionTracker::new(&config.symbols),
            clock: CooldownClock::new(config.cooldown(), config.failure_backoff()),
        }
    }

    pub fn view(&self, symbol: &str, now: Instant) -> MarketView {
        MarketView {
            price: self.prices.price(symbol),
            positions_known: self.positions.is_synced(),
            has_position: self.positions.has_position(symbol),
            reference_price: self.orders.reference_price(symbol),
            phase: self.clock.phase(symbol, now),
        }
    }
}

pub struct TradingEngine<E: ExchangeApi> {
    config: Arc<TradeConfig>,
    state: TradingState,
    decisions: TradeDecisionEngine,
    sizer: OrderSizer,
    executor: OrderExecutor<E>,
    snapshot: SharedSnapshot,
}

impl<E: ExchangeApi> TradingEngine<E> {
    pub fn new(config: Arc<TradeConfig>, executor: OrderExecutor<E>) -> Self {
        Self {
            state: TradingState::new(&config),
            decisions: TradeDecisionEngine::new(config.clone()),
            sizer: OrderSizer::new(config.clone()),
            snapshot: SharedSnapshot::default(),
            executor,
            config,
        }
    }

    pub fn state(&self) -> &TradingState {
        &self.state
    }

    /// Read handle for the dashboard.
    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Drain events until every sender is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineEvent>) {
        info!("Trading engine started for {:?}", self.config.symbols);
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!("Trading engine stopped: all event sources closed");
    }

    pub async fn handle(&mut self, event: EngineEvent) -> Option<Outcome> {
        self.handle_at(event, Instant::now()).await
    }

    /// Apply one event as of `now`. Only price ticks for tracked symbols
    /// produce an evaluation.
    pub async fn handle_at(&mut self, event: EngineEvent, now: Instant) -> Option<Outcome> {
        let outcome = match event {
            EngineEvent::MarkPrice { symbol, price } => {
                if self.state.prices.apply(&symbol, price) {
                    Some(self.evaluate(&symbol, now).await)
                } else {
                    debug!(symbol = %symbol, "Dropping tick for untracked symbol");
                    None
                }
            }
            EngineEvent::OpenOrders { symbol, orders } => {
                if self.config.is_tracked(&symbol) {
                    debug!(symbol = %symbol, count = orders.len(), "Open orders refreshed");
                    self.state.orders.replace(&symbol, orders);
                }
                None
            }
            EngineEvent::Positions(positions) => {
                debug!(count = positions.len(), "Positions refreshed");
                self.state.positions.replace_all(positions);
                None
            }
        };

        self.publish(now);
        outcome
    }

    async fn evaluate(&mut self, symbol: &str, now: Instant) -> Outcome {
        let view = self.state.view(symbol, now);
        let decision = self.decisions.evaluate(&view);

        let price = match decision {
            Decision::Skip(reason) => {
                debug!(symbol = %symbol, ?reason, "No trade");
                return Outcome::Skipped(reason);
            }
            Decision::Open { price } => {
                info!(symbol = %symbol, "🆕 {} no position, opening at {}", symbol, price);
                price
            }
            Decision::AddOn { price, trigger } => {
                info!(symbol = %symbol, "📈 {} Trigger Hit → {} vs {}", symbol, price, trigger);
                price
            }
        };

        let Some(quantity) = self.sizer.quantity(symbol, Some(price)) else {
            debug!(symbol = %symbol, price, "Capital below one quantity step");
            return Outcome::Skipped(SkipReason::NoQuantity);
        };

        let side = self.config.direction.entry_side();
        let accepted = self.executor.submit(symbol, side, quantity, price).await;

        if accepted {
            self.state.clock.record_success(symbol, now);
        } else {
            self.state.clock.record_failure(symbol, now);
        }

        Outcome::Submitted { side, quantity, price, accepted }
    }

    fn publish(&self, now: Instant) {
        let views = self
            .config
            .symbols
            .iter()
            .map(|symbol| {
                let price = self.state.prices.price(symbol);
                SymbolView {
                    symbol: symbol.clone(),
                    price,
                    reference_price: self.state.orders.reference_price(symbol),
                    trigger_price: self
                        .state
                        .orders
                        .trigger_price(symbol, self.config.rise_percent),
                    next_quantity: self.sizer.quantity(symbol, price),
                    position: self.state.positions.position(symbol).cloned(),
                    phase: self.state.clock.phase(symbol, now),
                }
            })
            .collect();

        *self.snapshot.write() = views;
    }
}
