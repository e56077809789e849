use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Pi42 sends numbers either as JSON numbers or as strings; accept both.
pub fn de_flex_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flex {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<Flex>::deserialize(deserializer)? {
        Some(Flex::Num(n)) => Some(n),
        Some(Flex::Str(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    }
    .filter(|n| n.is_finite()))
}

/// Whole-number prices go out as JSON integers (`6478`, not `6478.0`).
pub fn ser_whole_f64<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // 2^53: beyond this an f64 no longer holds every integer exactly
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// One resting order from `/v1/order/open-orders`. Market orders carry no price.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OpenOrder {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(default, deserialize_with = "de_flex_f64")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPosition {
    #[serde(rename = "contractPair")]
    contract_pair: Option<String>,
    symbol: Option<String>,
    #[serde(rename = "entryPrice", default, deserialize_with = "de_flex_f64")]
    entry_price: Option<f64>,
    #[serde(default, deserialize_with = "de_flex_f64")]
    quantity: Option<f64>,
}

/// An open position from `/v1/positions/OPEN`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: f64,
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawPosition::deserialize(deserializer)?;
        let symbol = raw
            .contract_pair
            .or(raw.symbol)
            .ok_or_else(|| serde::de::Error::missing_field("contractPair"))?;
        Ok(Position {
            symbol: symbol.to_uppercase(),
            entry_price: raw
                .entry_price
                .ok_or_else(|| serde::de::Error::missing_field("entryPrice"))?,
            quantity: raw
                .quantity
                .ok_or_else(|| serde::de::Error::missing_field("quantity"))?,
        })
    }
}

/// Payload of a `markPriceUpdate` stream event.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkPriceUpdate {
    #[serde(rename = "s")]
    pub symbol: Option<String>,
    #[serde(rename = "p", default, deserialize_with = "de_flex_f64")]
    pub price: Option<f64>,
}

impl MarkPriceUpdate {
    /// Upper-cased symbol and price, or `None` if either is missing.
    pub fn into_tick(self) -> Option<(String, f64)> {
        let symbol = self.symbol?.trim().to_uppercase();
        if symbol.is_empty() {
            return None;
        }
        Some((symbol, self.price?))
    }
}

/// Body of `POST /v1/order/place-order`. Field order is the wire order; the
/// signature is computed over this exact serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub timestamp: String,
    pub place_type: String,
    pub quantity: f64,
    pub side: OrderSide,
    pub price: u32,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub reduce_only: bool,
    pub margin_asset: String,
    pub device_type: String,
    pub user_category: String,
    #[serde(serialize_with = "ser_whole_f64")]
    pub take_profit_price: f64,
}
