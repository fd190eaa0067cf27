//! Order domain model: sides, statuses, tickets and fills.

use std::fmt;

// =============================================================================
// Enums
// =============================================================================

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Venue wire value.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Order lifecycle status.
///
/// `New → Submitted → {PartiallyFilled → Filled | Canceled | Invalid}`,
/// with `UpdateSubmitted` as the side-transition on amend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    Submitted,
    UpdateSubmitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Invalid,
}

impl OrderStatus {
    /// Terminal states evict the order from every cache.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Invalid
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::UpdateSubmitted => "UPDATE_SUBMITTED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

/// Order type, folded together with time-in-force the way the venue's
/// `ordType` field works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderType {
    Market,
    #[default]
    Limit,
    /// Fill-or-kill: execute completely and immediately or not at all.
    Fok,
    /// Immediate-or-cancel.
    Ioc,
}

impl OrderType {
    pub fn as_wire(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Fok => "fok",
            OrderType::Ioc => "ioc",
        }
    }
}

// =============================================================================
// Tickets, fills, events
// =============================================================================

/// An engine-side order. Quantity is signed: positive buys, negative sells.
#[derive(Debug, Clone)]
pub struct OrderTicket {
    /// Caller-assigned identifier, correlated with the venue order id.
    pub internal_id: u64,
    /// Internal symbol (mapped to the venue instrument id at the edge).
    pub symbol: String,
    pub quantity: f64,
    pub order_type: OrderType,
    /// Limit price; ignored for market orders.
    pub price: f64,
    /// Free-form engine tag, hash-encoded into the venue's tag field.
    pub tag: String,
}

impl OrderTicket {
    pub fn side(&self) -> Side {
        if self.quantity >= 0.0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn abs_quantity(&self) -> f64 {
        self.quantity.abs()
    }
}

/// One execution against an order.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub trade_id: String,
    pub price: f64,
    pub quantity: f64,
    pub timestamp_ms: i64,
}

/// Status transition handed to the host engine's order notifier.
#[derive(Debug, Clone)]
pub struct OrderStatusEvent {
    pub internal_id: u64,
    pub symbol: String,
    pub status: OrderStatus,
    /// Cumulative filled quantity (absolute).
    pub filled: f64,
    pub fill: Option<OrderFill>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_round_trip() {
        assert_eq!(Side::from_str("BUY"), Some(Side::Buy));
        assert_eq!(Side::from_str("sell"), Some(Side::Sell));
        assert_eq!(Side::from_str("hold"), None);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn test_signed_quantity_side() {
        let buy = OrderTicket {
            internal_id: 1,
            symbol: "BTCUSDT".into(),
            quantity: 1.5,
            order_type: OrderType::Limit,
            price: 100.0,
            tag: String::new(),
        };
        assert_eq!(buy.side(), Side::Buy);

        let sell = OrderTicket {
            quantity: -1.5,
            ..buy.clone()
        };
        assert_eq!(sell.side(), Side::Sell);
        assert_eq!(sell.abs_quantity(), 1.5);
    }
}
