//! Routes inbound WebSocket frames.
//!
//! Control frames drive the connection state machine; data pushes fan out to
//! the book synchronizer, the order lifecycle manager and the tick sink.
//! Order pushes are handled synchronously so fills are never reordered
//! against REST responses; ticker and trade pushes are fire-and-forget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keysync::KeyedSynchronizer;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::domain::order::Side;
use crate::domain::orderbook::PriceLevel;
use crate::domain::tick::{QuoteTick, TradeTick};
use crate::infrastructure::books::{BookAction, BookDriver, BookUpdate};
use crate::infrastructure::orders::OrderLifecycleManager;
use crate::ports::{Notification, OrderNotifier, Severity, SymbolMapper, TickSink};

use super::connection::{subscribe_msg, AtomicConnState, ConnState};
use super::messages::{
    classify, AccountPushData, BooksPushData, Channel, OkxWsMessage, OrderPushData, PositionPushData,
    PushArg, TickerData, TradeData, WsEventMsg, WsPushMsg,
};

/// What the read loop should do after a frame is handled.
#[derive(Debug, PartialEq, Eq)]
pub enum RouterAction {
    /// Send a frame back on the socket (login follow-ups, resubscribes).
    SendText(String),
    /// Tear the socket down; the host engine owns reconnection.
    Reconnect,
}

pub struct WsRouter {
    pub state: Arc<AtomicConnState>,
    reconnect_pending: AtomicBool,
    mapper: Arc<dyn SymbolMapper>,
    sink: Arc<dyn TickSink>,
    notifier: Arc<dyn OrderNotifier>,
    manager: Arc<OrderLifecycleManager>,
    sync: Arc<KeyedSynchronizer<BookDriver>>,
    /// Everything currently subscribed, replayed after a re-login.
    subscriptions: RwLock<Vec<PushArg>>,
}

impl WsRouter {
    pub fn new(
        mapper: Arc<dyn SymbolMapper>,
        sink: Arc<dyn TickSink>,
        notifier: Arc<dyn OrderNotifier>,
        manager: Arc<OrderLifecycleManager>,
        sync: Arc<KeyedSynchronizer<BookDriver>>,
    ) -> Self {
        Self {
            state: Arc::new(AtomicConnState::new()),
            reconnect_pending: AtomicBool::new(false),
            mapper,
            sink,
            notifier,
            manager,
            sync,
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn mark_disconnected(&self) {
        let was = self.state.get();
        self.state.set(ConnState::Disconnected);
        self.reconnect_pending.store(true, Ordering::Release);
        // A rejected login or fatal channel error already reported this
        // teardown; only a live session produces a fresh notice.
        if was != ConnState::Disconnected {
            self.notifier.on_message(Notification::new(
                Severity::Disconnect,
                "ws-down",
                "WebSocket connection lost",
            ));
        }
    }

    pub fn track_subscription(&self, arg: PushArg) {
        let mut subs = self.subscriptions.write();
        if !subs.contains(&arg) {
            subs.push(arg);
        }
    }

    pub fn untrack_subscription(&self, arg: &PushArg) {
        self.subscriptions.write().retain(|s| s != arg);
    }

    pub fn tracked_subscriptions(&self) -> Vec<PushArg> {
        self.subscriptions.read().clone()
    }

    /// Handle one inbound text frame. Never panics on malformed input; junk
    /// is logged and dropped.
    pub async fn handle_frame(&self, text: &str) -> Option<RouterAction> {
        match classify(text) {
            OkxWsMessage::Pong => None,
            OkxWsMessage::Event(event) => self.handle_event(event),
            OkxWsMessage::Push(push) => self.handle_push(push).await,
            OkxWsMessage::Unknown(raw) => {
                warn!("[Router] Unrecognized frame dropped: {}", truncate(&raw));
                None
            }
        }
    }

    // ========================================================================
    // Control frames
    // ========================================================================

    fn handle_event(&self, event: WsEventMsg) -> Option<RouterAction> {
        match event.event.as_str() {
            "login" if event.code == "0" || event.code.is_empty() => {
                self.state.set(ConnState::Subscribing);
                if self.reconnect_pending.swap(false, Ordering::AcqRel) {
                    self.notifier.on_message(Notification::new(
                        Severity::Reconnect,
                        "ws-up",
                        "WebSocket session re-established",
                    ));
                } else {
                    info!("[Router] Login confirmed");
                }
                // Only private channels live behind the login; public
                // subscriptions are replayed when the public socket opens.
                let subs: Vec<PushArg> = self
                    .tracked_subscriptions()
                    .into_iter()
                    .filter(|arg| Channel::parse(&arg.channel).is_private())
                    .collect();
                if subs.is_empty() {
                    self.state.set(ConnState::Streaming);
                    None
                } else {
                    Some(RouterAction::SendText(subscribe_msg(&subs)))
                }
            }
            "login" => {
                self.notifier.on_message(Notification::new(
                    Severity::Disconnect,
                    &event.code,
                    format!("login rejected: {}", event.msg),
                ));
                self.reconnect_pending.store(true, Ordering::Release);
                self.state.set(ConnState::Disconnected);
                Some(RouterAction::Reconnect)
            }
            "subscribe" => {
                self.state.set(ConnState::Streaming);
                if let Some(arg) = event.arg {
                    debug!("[Router] Subscribed {}/{}", arg.channel, arg.inst_id);
                }
                None
            }
            "unsubscribe" => {
                if let Some(arg) = event.arg {
                    debug!("[Router] Unsubscribed {}/{}", arg.channel, arg.inst_id);
                }
                None
            }
            "error" => {
                let private = event
                    .arg
                    .as_ref()
                    .map(|arg| Channel::parse(&arg.channel).is_private())
                    .unwrap_or(self.state.get() == ConnState::Authenticating);
                if private {
                    // Losing a private channel silently drops fills; force a
                    // clean session instead.
                    self.notifier.on_message(Notification::new(
                        Severity::Disconnect,
                        &event.code,
                        format!("private channel failure: {}", event.msg),
                    ));
                    self.reconnect_pending.store(true, Ordering::Release);
                    self.state.set(ConnState::Disconnected);
                    Some(RouterAction::Reconnect)
                } else {
                    warn!(
                        "[Router] Channel error {}: {}",
                        event.code, event.msg
                    );
                    self.notifier.on_message(Notification::new(
                        Severity::Warning,
                        &event.code,
                        event.msg,
                    ));
                    None
                }
            }
            "channel-conn-count" => {
                info!(
                    "[Router] Connection count notice: {} connections",
                    event.conn_count
                );
                None
            }
            other => {
                debug!("[Router] Unhandled event `{}`", other);
                None
            }
        }
    }

    // ========================================================================
    // Data pushes
    // ========================================================================

    async fn handle_push(&self, push: WsPushMsg) -> Option<RouterAction> {
        match Channel::parse(&push.arg.channel) {
            Channel::Orders => {
                let items: Vec<OrderPushData> = parse_items(push.data)?;
                for item in items {
                    self.manager.handle_order_push(item).await;
                }
            }
            Channel::Account => {
                let items: Vec<AccountPushData> = parse_items(push.data)?;
                for item in items {
                    self.manager.handle_account_push(item);
                }
            }
            Channel::Positions => {
                let items: Vec<PositionPushData> = parse_items(push.data)?;
                for item in items {
                    self.manager.handle_position_push(item);
                }
            }
            Channel::Tickers => {
                let items: Vec<TickerData> = parse_items(push.data)?;
                let mapper = Arc::clone(&self.mapper);
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    for item in items {
                        emit_ticker(&*mapper, &*sink, item);
                    }
                });
            }
            Channel::Trades => {
                let items: Vec<TradeData> = parse_items(push.data)?;
                let mapper = Arc::clone(&self.mapper);
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    for item in items {
                        emit_trade(&*mapper, &*sink, item);
                    }
                });
            }
            Channel::Books => {
                let Some(symbol) = self.mapper.from_exchange(&push.arg.inst_id) else {
                    debug!("[Router] Book push for unmapped {}", push.arg.inst_id);
                    return None;
                };
                let action = match push.action.as_deref() {
                    Some("snapshot") => BookAction::Snapshot,
                    _ => BookAction::Update,
                };
                let items: Vec<BooksPushData> = parse_items(push.data)?;
                for item in items {
                    self.sync.push(symbol.clone(), book_update(action, item));
                }
            }
            Channel::PriceLimit => {
                let items: Vec<crate::infrastructure::rest::types::PriceLimitData> =
                    parse_items(push.data)?;
                for item in items {
                    self.manager
                        .handle_price_limit(&item.inst_id, &item.buy_lmt, &item.sell_lmt);
                }
            }
            Channel::Unknown(name) => {
                debug!("[Router] Push on unrouted channel `{}`", name);
            }
        }
        None
    }
}

fn parse_items<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> Option<Vec<T>> {
    match serde_json::from_value(data) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!("[Router] Malformed push payload dropped: {}", e);
            None
        }
    }
}

fn book_update(action: BookAction, item: BooksPushData) -> BookUpdate {
    BookUpdate {
        action,
        bids: item
            .bids
            .iter()
            .filter_map(|row| PriceLevel::from_wire(row))
            .collect(),
        asks: item
            .asks
            .iter()
            .filter_map(|row| PriceLevel::from_wire(row))
            .collect(),
        seq_id: item.seq_id.unwrap_or(0),
        prev_seq_id: item.prev_seq_id.unwrap_or(-1),
        checksum: item.checksum.map(|c| c as i32),
        ts: item.ts.parse::<i64>().unwrap_or(0),
    }
}

fn emit_ticker(mapper: &dyn SymbolMapper, sink: &dyn TickSink, item: TickerData) {
    let Some(symbol) = mapper.from_exchange(&item.inst_id) else {
        return;
    };
    let parsed = (
        item.bid_px.parse::<f64>(),
        item.bid_sz.parse::<f64>(),
        item.ask_px.parse::<f64>(),
        item.ask_sz.parse::<f64>(),
        item.ts.parse::<i64>(),
    );
    if let (Ok(bid_price), Ok(bid_size), Ok(ask_price), Ok(ask_size), Ok(timestamp_ms)) = parsed {
        sink.on_quote(QuoteTick {
            symbol,
            bid_price,
            bid_size,
            ask_price,
            ask_size,
            timestamp_ms,
        });
    }
}

fn emit_trade(mapper: &dyn SymbolMapper, sink: &dyn TickSink, item: TradeData) {
    let Some(symbol) = mapper.from_exchange(&item.inst_id) else {
        return;
    };
    let Some(aggressor) = Side::from_str(&item.side) else {
        return;
    };
    let parsed = (
        item.px.parse::<f64>(),
        item.sz.parse::<f64>(),
        item.ts.parse::<i64>(),
    );
    if let (Ok(price), Ok(size), Ok(timestamp_ms)) = parsed {
        sink.on_trade(TradeTick {
            symbol,
            price,
            size,
            aggressor,
            timestamp_ms,
        });
    }
}

/// Cut a frame down for logging without slicing inside a multi-byte
/// character.
fn truncate(raw: &str) -> &str {
    if raw.len() <= 200 {
        return raw;
    }
    let mut end = 200;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth::OkxSigner;
    use crate::infrastructure::books::{BookDriver, BookRegistry};
    use crate::infrastructure::config::OkxCredentials;
    use crate::infrastructure::rest::RestClient;
    use crate::ports::{NoOpTickSink, StaticSymbolMapper};
    use std::sync::Mutex as StdMutex;

    struct RecordingNotifier {
        messages: StdMutex<Vec<Notification>>,
    }

    impl OrderNotifier for RecordingNotifier {
        fn on_order_event(&self, _: crate::domain::order::OrderStatusEvent) {}
        fn on_message(&self, notification: Notification) {
            self.messages.lock().unwrap().push(notification);
        }
    }

    fn router() -> (WsRouter, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier {
            messages: StdMutex::new(Vec::new()),
        });
        let signer = Arc::new(OkxSigner::new(OkxCredentials::default()));
        let rest = Arc::new(RestClient::new(
            "http://localhost:0".to_string(),
            signer,
            false,
        ));
        let mapper: Arc<dyn SymbolMapper> =
            Arc::new(StaticSymbolMapper::new(&[("BTCUSDT", "BTC-USDT")]));
        let sink: Arc<dyn TickSink> = Arc::new(NoOpTickSink);
        let registry = Arc::new(BookRegistry::new());
        let manager = Arc::new(OrderLifecycleManager::new(
            Arc::clone(&rest),
            Arc::clone(&mapper),
            Arc::clone(&notifier) as Arc<dyn OrderNotifier>,
            Arc::clone(&registry),
        ));
        let driver = Arc::new(BookDriver::new(
            rest,
            Arc::clone(&mapper),
            Arc::clone(&sink),
            registry,
            400,
            None,
            25,
            false,
        ));
        let sync = Arc::new(KeyedSynchronizer::new(driver));
        let router = WsRouter::new(
            mapper,
            sink,
            Arc::clone(&notifier) as Arc<dyn OrderNotifier>,
            manager,
            sync,
        );
        (router, notifier)
    }

    #[tokio::test]
    async fn test_login_success_resubscribes() {
        let (router, _) = router();
        router.track_subscription(PushArg::new("books", "BTC-USDT"));
        router.track_subscription(PushArg::new("orders", ""));

        let action = router
            .handle_frame(r#"{"event":"login","code":"0","msg":""}"#)
            .await;
        match action {
            Some(RouterAction::SendText(frame)) => {
                let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
                assert_eq!(parsed["op"], "subscribe");
                // Only the private channel is replayed behind the login.
                assert_eq!(parsed["args"].as_array().unwrap().len(), 1);
                assert_eq!(parsed["args"][0]["channel"], "orders");
            }
            other => panic!("expected resubscribe frame, got {:?}", other),
        }
        assert_eq!(router.state.get(), ConnState::Subscribing);
    }

    #[tokio::test]
    async fn test_login_failure_requests_reconnect() {
        let (router, notifier) = router();
        let action = router
            .handle_frame(r#"{"event":"login","code":"60009","msg":"Login failed"}"#)
            .await;
        assert_eq!(action, Some(RouterAction::Reconnect));
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages[0].severity, Severity::Disconnect);
    }

    #[tokio::test]
    async fn test_reconnect_notice_after_disconnect() {
        let (router, notifier) = router();
        router.state.set(ConnState::Streaming);
        router.mark_disconnected();
        router
            .handle_frame(r#"{"event":"login","code":"0","msg":""}"#)
            .await;
        let severities: Vec<Severity> = notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.severity)
            .collect();
        assert_eq!(severities, vec![Severity::Disconnect, Severity::Reconnect]);
    }

    #[tokio::test]
    async fn test_rejected_login_notifies_exactly_once() {
        let (router, notifier) = router();
        router.state.set(ConnState::Authenticating);
        let action = router
            .handle_frame(r#"{"event":"login","code":"60009","msg":"Login failed"}"#)
            .await;
        assert_eq!(action, Some(RouterAction::Reconnect));
        // The session loop tears down afterwards; that must not double-report.
        router.mark_disconnected();

        let severities: Vec<Severity> = notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.severity)
            .collect();
        assert_eq!(severities, vec![Severity::Disconnect]);
    }

    #[tokio::test]
    async fn test_public_channel_error_is_nonfatal() {
        let (router, notifier) = router();
        let action = router
            .handle_frame(
                r#"{"event":"error","code":"60012","msg":"bad channel","arg":{"channel":"tickers","instId":"BTC-USDT"}}"#,
            )
            .await;
        assert!(action.is_none());
        assert_eq!(
            notifier.messages.lock().unwrap()[0].severity,
            Severity::Warning
        );
    }

    #[tokio::test]
    async fn test_private_channel_error_forces_reconnect() {
        let (router, _) = router();
        let action = router
            .handle_frame(
                r#"{"event":"error","code":"60012","msg":"denied","arg":{"channel":"orders"}}"#,
            )
            .await;
        assert_eq!(action, Some(RouterAction::Reconnect));
    }

    #[tokio::test]
    async fn test_garbage_frame_is_dropped() {
        let (router, _) = router();
        assert!(router.handle_frame("💥 not a frame").await.is_none());
        assert!(router.handle_frame("{\"weird\":true}").await.is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // Byte 200 lands inside the four-byte emoji; the cut must back up
        // to the boundary instead of slicing through it.
        let raw = format!("{}💥tail", "x".repeat(199));
        let cut = truncate(&raw);
        assert_eq!(cut, "x".repeat(199));

        // Multi-byte text throughout.
        let raw = "é".repeat(150);
        let cut = truncate(&raw);
        assert!(cut.len() <= 200);
        assert!(raw.starts_with(cut));

        assert_eq!(truncate("short"), "short");
    }

    #[tokio::test]
    async fn test_long_unicode_frame_is_dropped_not_fatal() {
        let (router, _) = router();
        let frame = format!("{}💥 остаток кадра", "x".repeat(199));
        assert!(router.handle_frame(&frame).await.is_none());
    }

    #[tokio::test]
    async fn test_book_push_routed_to_synchronizer() {
        let (router, _) = router();
        let raw = r#"{"arg":{"channel":"books","instId":"BTC-USDT"},"action":"update","data":[{"asks":[["100","1","0","1"]],"bids":[],"ts":"1","seqId":10,"prevSeqId":9}]}"#;
        assert!(router.handle_frame(raw).await.is_none());
        // The symbol now has a synchronization domain.
        assert!(router.sync.contains_key(&"BTCUSDT".to_string()));
    }

    #[tokio::test]
    async fn test_subscription_tracking_dedupes() {
        let (router, _) = router();
        router.track_subscription(PushArg::new("books", "BTC-USDT"));
        router.track_subscription(PushArg::new("books", "BTC-USDT"));
        assert_eq!(router.tracked_subscriptions().len(), 1);
        router.untrack_subscription(&PushArg::new("books", "BTC-USDT"));
        assert!(router.tracked_subscriptions().is_empty());
    }
}
