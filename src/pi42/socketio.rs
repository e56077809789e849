//! Minimal Socket.IO v5 / Engine.IO v4 text framing over a raw WebSocket.
//!
//! Only the subset the mark-price feed needs: handshake, ping/pong, namespace
//! connect and JSON events on the default namespace.

use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Namespace connect sent once the Engine.IO handshake arrives.
pub const CONNECT: &str = "40";
/// Engine.IO pong reply to a server ping.
pub const PONG: &str = "3";

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake (`0{...}`)
    Open(Value),
    /// Engine.IO close (`1`)
    Close,
    Ping,
    Pong,
    /// Socket.IO namespace connected (`40`)
    Connected,
    /// Socket.IO namespace disconnected (`41`)
    Disconnected,
    ConnectError(Value),
    Event { name: String, data: Value },
    Unknown(String),
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Packet {
    let mut chars = frame.chars();
    match chars.next() {
        Some('0') => Packet::Open(serde_json::from_str(chars.as_str()).unwrap_or(Value::Null)),
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('3') => Packet::Pong,
        Some('4') => decode_message(chars.as_str()).unwrap_or_else(|| Packet::Unknown(frame.to_string())),
        _ => Packet::Unknown(frame.to_string()),
    }
}

fn decode_message(rest: &str) -> Option<Packet> {
    let kind = rest.chars().next()?;
    let mut body = &rest[kind.len_utf8()..];

    // Optional namespace ("/ns,") then optional ack id digits.
    if body.starts_with('/') {
        let comma = body.find(',')?;
        body = &body[comma + 1..];
    }
    let body = body.trim_start_matches(|c: char| c.is_ascii_digit());

    match kind {
        '0' => Some(Packet::Connected),
        '1' => Some(Packet::Disconnected),
        '2' => {
            let mut items = match serde_json::from_str::<Value>(body).ok()? {
                Value::Array(items) => items.into_iter(),
                _ => return None,
            };
            let name = items.next()?.as_str()?.to_string();
            let data = items.next().unwrap_or(Value::Null);
            Some(Packet::Event { name, data })
        }
        '4' => Some(Packet::ConnectError(
            serde_json::from_str(body).unwrap_or(Value::Null),
        )),
        _ => None,
    }
}

/// Encode an event emit on the default namespace (`42["name",data]`).
pub fn encode_event(name: &str, data: &Value) -> String {
    format!("42{}", Value::Array(vec![Value::String(name.to_string()), data.clone()]))
}

/// Turn a Socket.IO base URL (`https://host/`) into its WebSocket transport
/// endpoint (`wss://host/socket.io/?EIO=4&transport=websocket`).
pub fn transport_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid stream url: {}", base))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => anyhow::bail!("unsupported stream scheme: {}", other),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot switch {} to {}", base, scheme))?;

    if !url.path().contains("socket.io") {
        let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");

    Ok(url)
}
