use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::ExchangeError;
use crate::pi42::auth::AccountSigner;
use crate::pi42::types::*;

pub mod executor;

pub use executor::OrderExecutor;

/// The authenticated venue operations the bot needs. `Pi42Client` is the
/// production implementation; tests substitute in-memory doubles.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Resting orders for one symbol.
    async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, ExchangeError>;

    /// All open positions on the account.
    async fn open_positions(&self) -> Result<Vec<Position>, ExchangeError>;

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderAck, ExchangeError>;
}

/// Transport-level acceptance of an order. Says nothing about fills.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub status: u16,
    pub body: serde_json::Value,
}

pub struct Pi42Client {
    client: Client,
    signer: AccountSigner,
    rest_url: String,
}

impl Pi42Client {
    pub fn new(rest_url: String, signer: AccountSigner, timeout: Duration) -> Result<Self, ExchangeError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            signer,
            rest_url: rest_url.trim_end_matches('/').to_string(),
        })
    }

    /// Signed GET: the signature covers the exact query string sent.
    async fn signed_get(&self, path: &str, params: &[(&str, String)]) -> Result<String, ExchangeError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        let signature = self.signer.sign(&query)?;

        let response = self
            .client
            .get(format!("{}{}?{}", self.rest_url, path, query))
            .header("api-key", self.signer.api_key())
            .header("signature", signature)
            .send()
            .await?;

        read_success(response).await
    }

    async fn signed_post(&self, path: &str, body: String) -> Result<(u16, String), ExchangeError> {
        let signature = self.signer.sign(&body)?;

        let response = self
            .client
            .post(format!("{}{}", self.rest_url, path))
            .header("api-key", self.signer.api_key())
            .header("signature", signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        Ok((status, read_success(response).await?))
    }
}

#[async_trait]
impl ExchangeApi for Pi42Client {
    async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("timestamp", AccountSigner::timestamp().to_string()),
        ];
        let text = self.signed_get("/v1/order/open-orders", &params).await?;

        Ok(parse_list::<OpenOrder>(&text)?
            .into_iter()
            .filter(|o| o.symbol.eq_ignore_ascii_case(symbol))
            .collect())
    }

    async fn open_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let params = [
            ("sortOrder", "desc".to_string()),
            ("pageSize", "100".to_string()),
            ("timestamp", AccountSigner::timestamp().to_string()),
        ];
        let text = self.signed_get("/v1/positions/OPEN", &params).await?;

        parse_list::<Position>(&text)
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderAck, ExchangeError> {
        let body = serde_json::to_string(request)?;
        let (status, text) = self.signed_post("/v1/order/place-order", body).await?;

        Ok(OrderAck {
            status,
            body: serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
        })
    }
}

async fn read_success(response: reqwest::Response) -> Result<String, ExchangeError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ExchangeError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

/// Parse a JSON array, skipping entries that don't fit `T`. A body that isn't
/// an array at all is a decode error.
fn parse_list<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ExchangeError> {
    let items: Vec<serde_json::Value> = serde_json::from_str(text)?;

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping malformed entry {}: {}", item, e);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(url: String) -> Pi42Client {
        Pi42Client::new(
            url,
            AccountSigner::new("key".to_string(), "secret".to_string()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn request() -> PlaceOrderRequest {
        PlaceOrderRequest {
            timestamp: "1700000000000".to_string(),
            place_type: "ORDER_FORM".to_string(),
            quantity: 0.6,
            side: OrderSide::Sell,
            price: 0,
            symbol: "XPTINR".to_string(),
            order_type: "MARKET".to_string(),
            reduce_only: false,
            margin_asset: "INR".to_string(),
            device_type: "WEB".to_string(),
            user_category: "EXTERNAL".to_string(),
            take_profit_price: 99.0,
        }
    }

    #[tokio::test]
    async fn test_open_orders_filters_symbol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/order/open-orders")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "XPTINR".into()),
                Matcher::Regex("timestamp=\\d+".into()),
            ]))
            .match_header("api-key", "key")
            .match_header("signature", Matcher::Regex("^[0-9a-f]{64}$".into()))
            .with_status(200)
            .with_body(
                r#"[{"symbol":"XPTINR","side":"BUY","price":"95"},
                    {"symbol":"BTCINR","side":"BUY","price":"10"},
                    {"symbol":"XPTINR","side":"WEIRD"}]"#,
            )
            .create_async()
            .await;

        let orders = client(server.url()).open_orders("XPTINR").await.unwrap();
        mock.assert_async().await;

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].price, Some(95.0));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/positions/OPEN")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"bad signature"}"#)
            .create_async()
            .await;

        let err = client(server.url()).open_positions().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/positions/OPEN")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client(server.url()).open_positions().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Decode(_)));
    }

    #[tokio::test]
    async fn test_place_order_signs_exact_body() {
        let body = serde_json::to_string(&request()).unwrap();
        let signature = AccountSigner::new("key".to_string(), "secret".to_string())
            .sign(&body)
            .unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/order/place-order")
            .match_header("api-key", "key")
            .match_header("signature", signature.as_str())
            .match_header("content-type", "application/json")
            .match_body(body.as_str())
            .with_status(201)
            .with_body(r#"{"id":"abc"}"#)
            .create_async()
            .await;

        let ack = client(server.url()).place_order(&request()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(ack.status, 201);
        assert_eq!(ack.body["id"], "abc");
    }
}
