use parking_lot::RwLock;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::pi42::types::Position;
use crate::strategy::{Direction, SymbolPhase};

/// What the dashboard shows for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolView {
    pub symbol: String,
    pub price: Option<f64>,
    pub reference_price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub next_quantity: Option<f64>,
    pub position: Option<Position>,
    pub phase: SymbolPhase,
}

/// Published by the engine after every event; read-only everywhere else.
pub type SharedSnapshot = Arc<RwLock<Vec<SymbolView>>>;

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
}

pub fn render(views: &[SymbolView], direction: Direction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "========== {} DASHBOARD ==========", direction);

    for view in views {
        let _ = writeln!(out, "🔹 {}", view.symbol);
        let _ = writeln!(out, "   Mark: {}", opt(view.price));
        let _ = writeln!(out, "   Reference {}: {}", direction.accumulation_side(), opt(view.reference_price));
        let _ = writeln!(out, "   Trigger Price: {}", opt(view.trigger_price));
        let _ = writeln!(out, "   Next {} Qty: {}", direction.entry_side(), opt(view.next_quantity));

        match &view.position {
            Some(pos) => {
                let pnl = view
                    .price
                    .map(|p| direction.unrealised_pnl(pos.entry_price, p, pos.quantity.abs()))
                    .unwrap_or(0.0);
                let _ = writeln!(
                    out,
                    "   Position → Qty:{} Entry:{} PnL:{:.2}",
                    pos.quantity, pos.entry_price, pnl
                );
            }
            None => {
                let _ = writeln!(out, "   Position → None");
            }
        }

        match view.phase {
            SymbolPhase::Idle => {}
            SymbolPhase::CoolingDown { remaining } => {
                let _ = writeln!(out, "   Cooldown: {}s left", remaining.as_secs());
            }
            SymbolPhase::RetryBackoff { remaining } => {
                let _ = writeln!(out, "   Retry backoff: {}s left", remaining.as_secs());
            }
        }
    }

    out
}

/// Log the rendered snapshot every `interval`. Never touches trading state.
pub async fn run_dashboard(snapshot: SharedSnapshot, direction: Direction, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let views = snapshot.read().clone();
        if views.is_empty() {
            continue;
        }
        info!("\n{}", render(&views, direction));
    }
}
