pub mod config;
pub mod error;
pub mod pi42;
pub mod market;
pub mod orderbook;
pub mod positions;
pub mod risk;
pub mod strategy;
pub mod execution;
pub mod engine;
pub mod polling;
pub mod dashboard;

pub use config::Config;
pub use engine::{EngineEvent, TradingEngine};
pub use pi42::{AccountSigner, MarkPriceStream};
