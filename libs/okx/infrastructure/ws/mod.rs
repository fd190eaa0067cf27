//! WebSocket protocol layer: frame classification, connection state, router.

pub mod connection;
pub mod messages;
pub mod router;
