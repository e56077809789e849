use std::collections::HashMap;

use crate::pi42::types::Position;

/// Open position per tracked symbol, as of the last successful poll.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    symbols: Vec<String>,
    positions: HashMap<String, Position>,
    /// Set by the first applied poll; until then "no entry" means unknown.
    synced: bool,
}

impl PositionTracker {
    pub fn new(symbols: &[String]) -> Self {
        Self {
            symbols: symbols.to_vec(),
            positions: HashMap::new(),
            synced: false,
        }
    }

    /// Apply one poll result: every tracked symbol gets the matching entry or
    /// none. Zero-quantity entries count as flat.
    pub fn replace_all(&mut self, positions: Vec<Position>) {
        let mut by_symbol: HashMap<String, Position> = positions
            .into_iter()
            .filter(|p| p.quantity.abs() > 0.0)
            .map(|p| (p.symbol.clone(), p))
            .collect();

        self.positions = self
            .symbols
            .iter()
            .filter_map(|s| by_symbol.remove(s).map(|p| (s.clone(), p)))
            .collect();
        self.synced = true;
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }
}
