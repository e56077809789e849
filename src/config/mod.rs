use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::strategy::Direction;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub trading: TradeConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_rest_url() -> String { "https://fapi.pi42.com".to_string() }
fn default_ws_url() -> String { "https://fawss.pi42.com/".to_string() }
fn default_request_timeout_secs() -> u64 { 15 }
fn default_reconnect_delay_secs() -> u64 { 5 }

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Both credentials, or `MissingCredentials` if either is absent or blank.
    pub fn credentials(&self) -> Result<(String, String), ConfigError> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Ok((key.clone(), secret.clone()))
            }
            _ => Err(ConfigError::MissingCredentials),
        }
    }
}

/// Per-deployment trading constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradeConfig {
    pub symbols: Vec<String>,
    pub capital_per_trade: f64,
    pub rise_percent: f64,
    pub take_profit_percent: f64,
    pub cooldown_secs: u64,
    #[serde(default = "default_failure_backoff_secs")]
    pub failure_backoff_secs: u64,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    pub margin_asset: String,
    #[serde(default)]
    pub require_seed_order: bool,
    #[serde(default)]
    pub min_qty: HashMap<String, f64>,
    #[serde(default = "default_min_qty")]
    pub default_min_qty: f64,
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,
    #[serde(default = "default_place_type")]
    pub place_type: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_user_category")]
    pub user_category: String,
}

fn default_failure_backoff_secs() -> u64 { 5 }
fn default_direction() -> Direction { Direction::Short }
fn default_min_qty() -> f64 { 0.001 }
fn default_quantity_precision() -> u32 { 3 }
fn default_price_precision() -> u32 { 2 }
fn default_place_type() -> String { "ORDER_FORM".to_string() }
fn default_device_type() -> String { "WEB".to_string() }
fn default_user_category() -> String { "EXTERNAL".to_string() }

impl TradeConfig {
    /// Minimum quantity step for `symbol`, falling back to `default_min_qty`.
    pub fn step(&self, symbol: &str) -> f64 {
        self.min_qty.get(symbol).copied().unwrap_or(self.default_min_qty)
    }

    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    /// Upper-cases symbols and step keys, then checks the values the sizer and
    /// trigger math depend on.
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        self.symbols = self
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        self.min_qty = self
            .min_qty
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();

        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if !(self.capital_per_trade > 0.0) {
            return Err(ConfigError::InvalidParameter {
                field: "capital_per_trade",
                reason: format!("must be positive, got {}", self.capital_per_trade),
            });
        }
        if !(self.default_min_qty > 0.0) {
            return Err(ConfigError::InvalidParameter {
                field: "default_min_qty",
                reason: format!("must be positive, got {}", self.default_min_qty),
            });
        }
        if let Some((symbol, step)) = self.min_qty.iter().find(|(_, v)| !(**v > 0.0)) {
            return Err(ConfigError::InvalidParameter {
                field: "min_qty",
                reason: format!("step for {} must be positive, got {}", symbol, step),
            });
        }
        if self.take_profit_percent < 0.0 || self.rise_percent < 0.0 {
            return Err(ConfigError::InvalidParameter {
                field: "rise_percent/take_profit_percent",
                reason: "percentages must not be negative".to_string(),
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_positions_interval")]
    pub positions_interval_secs: u64,
    #[serde(default = "default_orders_interval")]
    pub orders_interval_secs: u64,
    #[serde(default = "default_dashboard_interval")]
    pub dashboard_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            positions_interval_secs: default_positions_interval(),
            orders_interval_secs: default_orders_interval(),
            dashboard_interval_secs: default_dashboard_interval(),
        }
    }
}

fn default_positions_interval() -> u64 { 10 }
fn default_orders_interval() -> u64 { 12 }
fn default_dashboard_interval() -> u64 { 4 }

impl Config {
    pub fn load() -> Result<Arc<Self>> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("BOT").separator("__"));

        // Credentials come from the environment (or .env)
        if let Ok(api_key) = std::env::var("API_KEY") {
            builder = builder.set_override("exchange.api_key", api_key)?;
        }

        if let Ok(api_secret) = std::env::var("SECRET_KEY") {
            builder = builder.set_override("exchange.api_secret", api_secret)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(Arc::new(config.validate()?))
    }

    /// Startup validation: anything returned here is fatal.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.exchange.credentials()?;
        self.trading = self.trading.normalize()?;
        Ok(self)
    }
}
