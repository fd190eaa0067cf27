//! Domain entities: order books, checksum validation, orders, ticks.

pub mod checksum;
pub mod order;
pub mod orderbook;
pub mod tick;
