use ordered_float::OrderedFloat;
use std::collections::HashMap;

use crate::pi42::types::{OpenOrder, OrderSide};
use crate::strategy::Direction;

/// Open orders per symbol, as of the last successful poll.
///
/// Each poll replaces a symbol's snapshot wholesale; a failed poll sends
/// nothing, so the previous snapshot stays in place.
#[derive(Debug, Clone)]
pub struct OrderBookTracker {
    direction: Direction,
    orders: HashMap<String, Vec<OpenOrder>>,
}

impl OrderBookTracker {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            orders: HashMap::new(),
        }
    }

    pub fn replace(&mut self, symbol: &str, orders: Vec<OpenOrder>) {
        self.orders.insert(symbol.to_string(), orders);
    }

    pub fn orders(&self, symbol: &str) -> &[OpenOrder] {
        self.orders.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positive resting prices on `side` for `symbol`.
    fn open_prices<'a>(&'a self, symbol: &str, side: OrderSide) -> impl Iterator<Item = OrderedFloat<f64>> + 'a {
        self.orders(symbol)
            .iter()
            .filter(move |o| o.side == side)
            .filter_map(|o| o.price)
            .filter(|p| *p > 0.0)
            .map(OrderedFloat)
    }

    /// Highest resting BUY price, the reference level for a short book.
    pub fn highest_open_buy_price(&self, symbol: &str) -> Option<f64> {
        self.open_prices(symbol, OrderSide::Buy).max().map(|p| p.0)
    }

    /// Reference level on the accumulation side: the highest BUY when short,
    /// the lowest SELL when long.
    pub fn reference_price(&self, symbol: &str) -> Option<f64> {
        let prices = self.open_prices(symbol, self.direction.accumulation_side());
        let best = match self.direction {
            Direction::Short => prices.max(),
            Direction::Long => prices.min(),
        };
        best.map(|p| p.0)
    }

    /// `reference_price` moved `rise_percent` in our favour, rounded to 2 places.
    pub fn trigger_price(&self, symbol: &str, rise_percent: f64) -> Option<f64> {
        self.reference_price(symbol)
            .map(|r| self.direction.trigger_price(r, rise_percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: OrderSide, price: Option<f64>) -> OpenOrder {
        OpenOrder {
            symbol: "X".to_string(),
            side,
            price,
        }
    }

    #[test]
    fn test_highest_buy_and_trigger() {
        let mut tracker = OrderBookTracker::new(Direction::Short);
        tracker.replace(
            "X",
            vec![
                order(OrderSide::Buy, Some(90.0)),
                order(OrderSide::Buy, Some(95.0)),
                order(OrderSide::Sell, Some(120.0)),
                order(OrderSide::Buy, None),
            ],
        );

        assert_eq!(tracker.highest_open_buy_price("X"), Some(95.0));
        assert_eq!(tracker.reference_price("X"), Some(95.0));
        assert_eq!(tracker.trigger_price("X", 3.0), Some(97.85));
    }

    #[test]
    fn test_trigger_none_without_accumulation_orders() {
        let mut tracker = OrderBookTracker::new(Direction::Short);
        assert_eq!(tracker.trigger_price("X", 3.0), None);

        tracker.replace("X", vec![order(OrderSide::Sell, Some(100.0)), order(OrderSide::Buy, None)]);
        assert_eq!(tracker.highest_open_buy_price("X"), None);
        assert_eq!(tracker.trigger_price("X", 3.0), None);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut tracker = OrderBookTracker::new(Direction::Short);
        tracker.replace("X", vec![order(OrderSide::Buy, Some(95.0))]);
        tracker.replace("X", vec![order(OrderSide::Buy, Some(80.0))]);
        assert_eq!(tracker.reference_price("X"), Some(80.0));

        tracker.replace("X", Vec::new());
        assert_eq!(tracker.reference_price("X"), None);
        assert!(tracker.orders("X").is_empty());
    }

    #[test]
    fn test_long_uses_lowest_sell() {
        let mut tracker = OrderBookTracker::new(Direction::Long);
        tracker.replace(
            "X",
            vec![
                order(OrderSide::Sell, Some(110.0)),
                order(OrderSide::Sell, Some(105.0)),
                order(OrderSide::Buy, Some(99.0)),
            ],
        );
        assert_eq!(tracker.reference_price("X"), Some(105.0));
        assert_eq!(tracker.trigger_price("X", 2.0), Some(102.9));
    }

    #[test]
    fn test_highest_buy_ignores_direction() {
        let mut tracker = OrderBookTracker::new(Direction::Long);
        tracker.replace(
            "X",
            vec![
                order(OrderSide::Buy, Some(99.0)),
                order(OrderSide::Buy, Some(101.5)),
                order(OrderSide::Buy, Some(0.0)),
                order(OrderSide::Sell, Some(130.0)),
            ],
        );
        assert_eq!(tracker.highest_open_buy_price("X"), Some(101.5));
        assert_eq!(tracker.reference_price("X"), Some(130.0));
    }
}
