use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use anyhow::{Context, Result};

use super::socketio::{self, Packet};
use super::types::MarkPriceUpdate;
use crate::engine::EngineEvent;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const MARK_PRICE_EVENT: &str = "markPriceUpdate";

// Engine.IO v4 server defaults, used until the handshake says otherwise.
const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

/// How long the server may stay silent before the connection counts as dead:
/// `pingInterval + pingTimeout` from the handshake.
pub fn silence_deadline(handshake: &serde_json::Value) -> Duration {
    let interval = handshake["pingInterval"].as_u64().unwrap_or(DEFAULT_PING_INTERVAL_MS);
    let timeout = handshake["pingTimeout"].as_u64().unwrap_or(DEFAULT_PING_TIMEOUT_MS);
    Duration::from_millis(interval.saturating_add(timeout))
}

/// Mark-price subscription for the tracked symbols. Reconnects forever.
pub struct MarkPriceStream {
    url: String,
    symbols: Vec<String>,
    reconnect_delay: Duration,
}

impl MarkPriceStream {
    pub fn new(url: String, symbols: Vec<String>, reconnect_delay: Duration) -> Self {
        Self {
            url,
            symbols,
            reconnect_delay,
        }
    }

    /// Per-symbol mark-price topics, e.g. `xptinr@markPrice`.
    pub fn topics(&self) -> Vec<String> {
        self.symbols
            .iter()
            .map(|s| format!("{}@markPrice", s.to_lowercase()))
            .collect()
    }

    pub async fn connect(&self) -> Result<WsStream> {
        let url = socketio::transport_url(&self.url)?;
        info!("Connecting to Pi42 price stream: {}", url);

        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .context("price stream connect failed")?;

        info!("WebSocket connected: {:?}", response.status());

        Ok(ws_stream)
    }

    /// Connect, subscribe and forward ticks until the engine goes away. Any
    /// failure or server close waits `reconnect_delay` and starts over.
    pub async fn run(self, tx: mpsc::Sender<EngineEvent>) {
        loop {
            match self.connect().await {
                Ok(ws_stream) => match self.handle_stream(ws_stream, &tx).await {
                    Ok(()) => warn!("Price stream ended"),
                    Err(e) => error!("Price stream error: {:#}", e),
                },
                Err(e) => error!("Connection failed: {:#}", e),
            }

            if tx.is_closed() {
                info!("Engine stopped, closing price stream");
                return;
            }

            warn!("Reconnecting in {:?}...", self.reconnect_delay);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn handle_stream(&self, ws_stream: WsStream, tx: &mpsc::Sender<EngineEvent>) -> Result<()> {
        let (mut write, mut read) = ws_stream.split();
        let mut deadline = silence_deadline(&serde_json::Value::Null);

        loop {
            let msg = match tokio::time::timeout(deadline, read.next()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(_) => anyhow::bail!("no traffic from price stream for {:?}", deadline),
            };

            let text = match msg? {
                Message::Text(text) => text,
                Message::Ping(data) => {
                    write.send(Message::Pong(data)).await?;
                    continue;
                }
                Message::Close(frame) => {
                    warn!("WebSocket closed by server: {:?}", frame);
                    break;
                }
                _ => continue,
            };

            match socketio::decode(&text) {
                Packet::Open(handshake) => {
                    deadline = silence_deadline(&handshake);
                    debug!("Engine.IO handshake: {} (silence deadline {:?})", handshake, deadline);
                    write.send(Message::Text(socketio::CONNECT.to_string())).await?;
                }
                Packet::Connected => {
                    let frame = socketio::encode_event(
                        "subscribe",
                        &json!({ "params": self.topics() }),
                    );
                    write.send(Message::Text(frame)).await?;
                    info!("WS Connected, subscribed to: {:?}", self.topics());
                }
                Packet::Ping => {
                    write.send(Message::Text(socketio::PONG.to_string())).await?;
                }
                Packet::Event { name, data } if name == MARK_PRICE_EVENT => {
                    if let Some((symbol, price)) = parse_mark_price(data) {
                        if tx.send(EngineEvent::MarkPrice { symbol, price }).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Packet::Event { name, .. } => debug!("Ignoring event: {}", name),
                Packet::ConnectError(detail) => {
                    anyhow::bail!("namespace connect rejected: {}", detail);
                }
                Packet::Disconnected | Packet::Close => {
                    warn!("Server disconnected the price stream");
                    break;
                }
                Packet::Pong | Packet::Unknown(_) => {}
            }
        }

        Ok(())
    }
}

/// `{s, p}` payload into an upper-cased `(symbol, price)`; malformed payloads
/// yield `None`.
pub fn parse_mark_price(data: serde_json::Value) -> Option<(String, f64)> {
    serde_json::from_value::<MarkPriceUpdate>(data).ok()?.into_tick()
}
