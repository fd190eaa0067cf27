//! WebSocket frame classification and push DTOs.
//!
//! The venue multiplexes two shapes on one socket: control frames with an
//! `event` field (login, subscribe, errors) and data pushes with `arg` +
//! `data`. Heartbeats are the literal text `pong`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug)]
pub enum OkxWsMessage {
    /// Heartbeat reply, the bare text `pong`.
    Pong,
    /// Control frame: login result, subscribe ack, channel error.
    Event(WsEventMsg),
    /// Data push for a subscribed channel.
    Push(WsPushMsg),
    /// Anything that fits neither shape; logged and dropped by the router.
    Unknown(String),
}

/// Classify a raw text frame by shape rather than by a type tag.
pub fn classify(text: &str) -> OkxWsMessage {
    if text == "pong" {
        return OkxWsMessage::Pong;
    }
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return OkxWsMessage::Unknown(text.to_string()),
    };
    if value.get("event").is_some() {
        match serde_json::from_value::<WsEventMsg>(value) {
            Ok(event) => return OkxWsMessage::Event(event),
            Err(_) => return OkxWsMessage::Unknown(text.to_string()),
        }
    }
    if value.get("arg").is_some() && value.get("data").is_some() {
        match serde_json::from_value::<WsPushMsg>(value) {
            Ok(push) => return OkxWsMessage::Push(push),
            Err(_) => return OkxWsMessage::Unknown(text.to_string()),
        }
    }
    OkxWsMessage::Unknown(text.to_string())
}

// ============================================================================
// Control frames
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WsEventMsg {
    pub event: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub arg: Option<PushArg>,
    #[serde(default, rename = "connCount")]
    pub conn_count: String,
}

/// Channel argument, used both when subscribing and on every push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushArg {
    pub channel: String,
    #[serde(default, rename = "instId", skip_serializing_if = "String::is_empty")]
    pub inst_id: String,
}

impl PushArg {
    pub fn new(channel: &str, inst_id: &str) -> Self {
        Self {
            channel: channel.to_string(),
            inst_id: inst_id.to_string(),
        }
    }
}

// ============================================================================
// Data pushes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WsPushMsg {
    pub arg: PushArg,
    /// `snapshot` or `update` on book channels, absent elsewhere.
    #[serde(default)]
    pub action: Option<String>,
    pub data: Value,
}

/// Channels this adapter routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Orders,
    Account,
    Positions,
    Tickers,
    Trades,
    Books,
    PriceLimit,
    Unknown(String),
}

impl Channel {
    pub fn parse(name: &str) -> Self {
        match name {
            "orders" => Channel::Orders,
            "account" => Channel::Account,
            "positions" => Channel::Positions,
            "tickers" => Channel::Tickers,
            "trades" => Channel::Trades,
            "books" => Channel::Books,
            "price-limit" => Channel::PriceLimit,
            other => Channel::Unknown(other.to_string()),
        }
    }

    /// Private channels require login and must be re-established on
    /// reconnect before trading resumes.
    pub fn is_private(&self) -> bool {
        matches!(self, Channel::Orders | Channel::Account | Channel::Positions)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPushData {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    pub inst_id: String,
    /// `live`, `partially_filled`, `filled`, `canceled`.
    pub state: String,
    pub side: String,
    #[serde(default)]
    pub sz: String,
    #[serde(default)]
    pub px: String,
    #[serde(default)]
    pub fill_sz: String,
    #[serde(default)]
    pub fill_px: String,
    #[serde(default)]
    pub trade_id: String,
    #[serde(default)]
    pub acc_fill_sz: String,
    #[serde(default)]
    pub u_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    pub inst_id: String,
    pub bid_px: String,
    pub bid_sz: String,
    pub ask_px: String,
    pub ask_sz: String,
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeData {
    pub inst_id: String,
    pub trade_id: String,
    pub px: String,
    pub sz: String,
    pub side: String,
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooksPushData {
    pub asks: Vec<Vec<String>>,
    pub bids: Vec<Vec<String>>,
    pub ts: String,
    /// Signed 32-bit CRC over the top levels; absent on some tiers.
    #[serde(default)]
    pub checksum: Option<i64>,
    #[serde(default)]
    pub seq_id: Option<i64>,
    #[serde(default)]
    pub prev_seq_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPushData {
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    pub ccy: String,
    #[serde(default)]
    pub cash_bal: String,
    #[serde(default)]
    pub avail_bal: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPushData {
    pub inst_id: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub avg_px: String,
}
