//! Wire DTOs for the REST surface. All numeric fields arrive as strings.

use serde::{Deserialize, Serialize};

/// Outer envelope on every REST response. `code == "0"` means success;
/// order endpoints additionally carry per-item `sCode` values.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerTime {
    pub ts: String,
}

/// Request body for order placement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub cl_ord_id: String,
    pub side: String,
    pub ord_type: String,
    pub sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

/// Request body for order amendment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendRequest {
    pub inst_id: String,
    pub cl_ord_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_px: Option<String>,
}

/// Request body for order cancellation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub inst_id: String,
    pub ord_id: String,
}

/// Per-order result item returned by place/amend/cancel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponseData {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

impl OrderResponseData {
    pub fn is_ok(&self) -> bool {
        self.s_code == "0"
    }
}

/// Book snapshot levels; each level is `[px, sz, liquidated_orders, orders]`.
#[derive(Debug, Clone, Deserialize)]
pub struct BooksData {
    pub asks: Vec<Vec<String>>,
    pub bids: Vec<Vec<String>>,
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLimitData {
    pub inst_id: String,
    pub buy_lmt: String,
    pub sell_lmt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentData {
    pub inst_id: String,
    pub inst_type: String,
    #[serde(default)]
    pub tick_sz: String,
    #[serde(default)]
    pub lot_sz: String,
    #[serde(default)]
    pub min_sz: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTrade {
    pub trade_id: String,
    pub px: String,
    pub sz: String,
    pub side: String,
    pub ts: String,
}
