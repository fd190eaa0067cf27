//! External collaborator interfaces
//!
//! The hosting trading engine is out of scope; these ports are the seams it
//! plugs into: symbol mapping, normalized tick delivery and order/status
//! notification. No-op implementations back the tests.

use crate::domain::order::OrderStatusEvent;
use crate::domain::tick::{DepthSnapshot, QuoteTick, TradeTick};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Symbol mapping
// =============================================================================

/// Maps internal engine symbols to venue instrument ids and back.
pub trait SymbolMapper: Send + Sync {
    fn to_exchange(&self, symbol: &str) -> Option<String>;
    fn from_exchange(&self, inst_id: &str) -> Option<String>;
}

/// HashMap-backed mapper seeded from `(internal, exchange)` pairs.
#[derive(Debug, Default)]
pub struct StaticSymbolMapper {
    to_exchange: HashMap<String, String>,
    from_exchange: HashMap<String, String>,
}

impl StaticSymbolMapper {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut mapper = Self::default();
        for (internal, exchange) in pairs {
            mapper.insert(internal, exchange);
        }
        mapper
    }

    pub fn insert(&mut self, internal: &str, exchange: &str) {
        self.to_exchange
            .insert(internal.to_string(), exchange.to_string());
        self.from_exchange
            .insert(exchange.to_string(), internal.to_string());
    }
}

impl SymbolMapper for StaticSymbolMapper {
    fn to_exchange(&self, symbol: &str) -> Option<String> {
        self.to_exchange.get(symbol).cloned()
    }

    fn from_exchange(&self, inst_id: &str) -> Option<String> {
        self.from_exchange.get(inst_id).cloned()
    }
}

// =============================================================================
// Tick sink
// =============================================================================

/// Receives normalized market data (the host engine's tick aggregator).
pub trait TickSink: Send + Sync {
    fn on_quote(&self, quote: QuoteTick);
    fn on_trade(&self, trade: TradeTick);
    fn on_depth(&self, depth: DepthSnapshot);
}

/// No-op sink for tests and diagnostics.
pub struct NoOpTickSink;

impl TickSink for NoOpTickSink {
    fn on_quote(&self, _: QuoteTick) {}
    fn on_trade(&self, _: TradeTick) {}
    fn on_depth(&self, _: DepthSnapshot) {}
}

// =============================================================================
// Order notification
// =============================================================================

/// Severity of an out-of-band notification routed through the host engine's
/// messaging channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Warning,
    Error,
    /// Transport lost; the host engine owns the reconnection policy.
    Disconnect,
    /// A successful login while a disconnect was pending acknowledgement.
    Reconnect,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Information => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
            Severity::Disconnect => "DISCONNECT",
            Severity::Reconnect => "RECONNECT",
        };
        f.write_str(s)
    }
}

/// Structured, user-visible notification. Business and transport problems
/// become these; the adapter itself never aborts the process.
#[derive(Debug, Clone)]
pub struct Notification {
    pub severity: Severity,
    pub code: String,
    pub text: String,
}

impl Notification {
    pub fn new(severity: Severity, code: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            text: text.into(),
        }
    }
}

/// Receives order-status transitions and adapter notifications.
pub trait OrderNotifier: Send + Sync {
    fn on_order_event(&self, event: OrderStatusEvent);
    fn on_message(&self, notification: Notification);
}

/// No-op notifier for tests.
pub struct NoOpOrderNotifier;

impl OrderNotifier for NoOpOrderNotifier {
    fn on_order_event(&self, _: OrderStatusEvent) {}
    fn on_message(&self, _: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_mapper_round_trip() {
        let mapper = StaticSymbolMapper::new(&[("BTCUSDT", "BTC-USDT"), ("ETHUSDT", "ETH-USDT")]);

        assert_eq!(mapper.to_exchange("BTCUSDT"), Some("BTC-USDT".to_string()));
        assert_eq!(
            mapper.from_exchange("ETH-USDT"),
            Some("ETHUSDT".to_string())
        );
        assert_eq!(mapper.to_exchange("DOGEUSDT"), None);
    }
}
