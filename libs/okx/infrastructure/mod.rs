//! Infrastructure: configuration, signing, REST gateway, WebSocket plumbing,
//! order-book synchronization and the order lifecycle manager.

pub mod auth;
pub mod books;
pub mod config;
pub mod orders;
pub mod rest;
pub mod tag;
pub mod ws;
