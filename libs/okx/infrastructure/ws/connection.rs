//! Connection state tracking and outbound frame builders.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::json;

use super::super::auth::OkxSigner;
use super::messages::PushArg;

// ============================================================================
// State machine
// ============================================================================

/// Lifecycle of a WebSocket session. Trading is allowed only in `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnState {
    Disconnected = 0,
    Connecting = 1,
    Authenticating = 2,
    Subscribing = 3,
    Streaming = 4,
}

pub struct AtomicConnState(AtomicU8);

impl AtomicConnState {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnState::Disconnected as u8))
    }

    pub fn get(&self) -> ConnState {
        match self.0.load(Ordering::Acquire) {
            1 => ConnState::Connecting,
            2 => ConnState::Authenticating,
            3 => ConnState::Subscribing,
            4 => ConnState::Streaming,
            _ => ConnState::Disconnected,
        }
    }

    pub fn set(&self, state: ConnState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub fn is_streaming(&self) -> bool {
        self.get() == ConnState::Streaming
    }
}

impl Default for AtomicConnState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the last inbound frame so the read loop can treat a silent socket
/// as dead.
pub struct LastSeen(Mutex<Instant>);

impl LastSeen {
    pub fn new() -> Self {
        Self(Mutex::new(Instant::now()))
    }

    pub fn touch(&self) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = Instant::now();
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.0
            .lock()
            .map(|guard| guard.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for LastSeen {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Frame builders
// ============================================================================

pub fn login_msg(signer: &OkxSigner) -> anyhow::Result<String> {
    let args = signer.ws_login_args()?;
    Ok(json!({"op": "login", "args": [args]}).to_string())
}

pub fn subscribe_msg(args: &[PushArg]) -> String {
    json!({"op": "subscribe", "args": args}).to_string()
}

pub fn unsubscribe_msg(args: &[PushArg]) -> String {
    json!({"op": "unsubscribe", "args": args}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let state = AtomicConnState::new();
        assert_eq!(state.get(), ConnState::Disconnected);
        state.set(ConnState::Streaming);
        assert!(state.is_streaming());
        state.set(ConnState::Connecting);
        assert!(!state.is_streaming());
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = subscribe_msg(&[
            PushArg::new("books", "BTC-USDT"),
            PushArg::new("orders", ""),
        ]);
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["op"], "subscribe");
        assert_eq!(parsed["args"][0]["channel"], "books");
        assert_eq!(parsed["args"][0]["instId"], "BTC-USDT");
        // Empty instId is omitted for account-level channels.
        assert!(parsed["args"][1].get("instId").is_none());
    }
}
