//! Normalized market-data records handed to the host engine's tick sink.

use crate::domain::order::Side;

/// Best bid/ask update for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteTick {
    pub symbol: String,
    pub bid_price: f64,
    pub bid_size: f64,
    pub ask_price: f64,
    pub ask_size: f64,
    pub timestamp_ms: i64,
}

/// One public trade print.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTick {
    pub symbol: String,
    pub price: f64,
    pub size: f64,
    pub aggressor: Side,
    pub timestamp_ms: i64,
}

/// Full-depth view of a synchronized book.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    pub symbol: String,
    /// Descending.
    pub bids: Vec<(f64, f64)>,
    /// Ascending.
    pub asks: Vec<(f64, f64)>,
    pub timestamp_ms: i64,
}
