//! OKX v5 brokerage adapter
//!
//! Bridges a trading engine to the OKX v5 API: authenticated WebSocket
//! streaming for order, account, position and market-data channels, REST for
//! order placement/amendment/cancellation and snapshot/backfill fetches, and
//! a per-symbol order-book synchronization pipeline with sequence validation,
//! checksum verification and automatic gap recovery.

pub mod adapter;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use adapter::OkxAdapter;
pub use domain::orderbook::{OrderBook, PriceLevel};
pub use domain::order::{OrderStatus, OrderTicket, OrderType, Side};
pub use infrastructure::config::OkxConfig;
pub use infrastructure::orders::OrderLifecycleManager;
pub use infrastructure::rest::RestClient;
