//! Drives the frame router with recorded wire traffic and checks the
//! resulting session transitions and cache effects, with no network.

use std::sync::{Arc, Mutex};

use keysync::KeyedSynchronizer;
use okx::domain::order::OrderStatusEvent;
use okx::infrastructure::auth::OkxSigner;
use okx::infrastructure::books::{BookDriver, BookRegistry};
use okx::infrastructure::config::OkxCredentials;
use okx::infrastructure::orders::OrderLifecycleManager;
use okx::infrastructure::rest::RestClient;
use okx::infrastructure::ws::connection::ConnState;
use okx::infrastructure::ws::messages::PushArg;
use okx::infrastructure::ws::router::{RouterAction, WsRouter};
use okx::ports::{
    NoOpTickSink, Notification, OrderNotifier, Severity, StaticSymbolMapper, SymbolMapper, TickSink,
};

struct RecordingNotifier {
    messages: Mutex<Vec<Notification>>,
}

impl OrderNotifier for RecordingNotifier {
    fn on_order_event(&self, _: OrderStatusEvent) {}
    fn on_message(&self, notification: Notification) {
        self.messages.lock().unwrap().push(notification);
    }
}

struct Harness {
    router: WsRouter,
    manager: Arc<OrderLifecycleManager>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let notifier = Arc::new(RecordingNotifier {
        messages: Mutex::new(Vec::new()),
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
    let router = WsRouter::new(
        mapper,
        sink,
        Arc::clone(&notifier) as Arc<dyn OrderNotifier>,
        Arc::clone(&manager),
        Arc::new(KeyedSynchronizer::new(driver)),
    );
    Harness {
        router,
        manager,
        notifier,
    }
}

#[tokio::test]
async fn session_bootstrap_replays_private_channels() {
    let h = harness();
    h.router.track_subscription(PushArg::new("orders", ""));
    h.router.track_subscription(PushArg::new("account", ""));
    h.router.track_subscription(PushArg::new("books", "BTC-USDT"));

    let action = h
        .router
        .handle_frame(r#"{"event":"login","code":"0","msg":"","connId":"abc"}"#)
        .await;
    let Some(RouterAction::SendText(frame)) = action else {
        panic!("expected resubscribe frame, got {:?}", action);
    };
    let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
    let channels: Vec<&str> = parsed["args"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["channel"].as_str().unwrap())
        .collect();
    assert_eq!(channels, vec!["orders", "account"]);
    assert_eq!(h.router.state.get(), ConnState::Subscribing);

    // First channel ack moves the session to streaming.
    h.router
        .handle_frame(r#"{"event":"subscribe","arg":{"channel":"orders"},"connId":"abc"}"#)
        .await;
    assert!(h.router.state.is_streaming());
}

#[tokio::test]
async fn disconnect_then_relogin_produces_reconnect_notice() {
    let h = harness();
    h.router.state.set(ConnState::Streaming);
    h.router.mark_disconnected();
    h.router
        .handle_frame(r#"{"event":"login","code":"0","msg":""}"#)
        .await;

    let severities: Vec<Severity> = h
        .notifier
        .messages
        .lock()
        .unwrap()
        .iter()
        .map(|m| m.severity)
        .collect();
    assert_eq!(severities, vec![Severity::Disconnect, Severity::Reconnect]);
}

#[tokio::test]
async fn account_push_lands_in_balance_cache() {
    let h = harness();
    let raw = r#"{"arg":{"channel":"account"},"data":[{"details":[{"ccy":"USDT","cashBal":"1000","availBal":"950.5"},{"ccy":"BTC","cashBal":"0.2","availBal":"0.2"}]}]}"#;
    assert!(h.router.handle_frame(raw).await.is_none());
    assert_eq!(h.manager.balances.get("USDT"), Some(950.5));
    assert_eq!(h.manager.balances.get("BTC"), Some(0.2));
    assert_eq!(h.manager.balances.get("ETH"), None);
}

#[tokio::test]
async fn foreign_order_push_is_silent() {
    let h = harness();
    let raw = r#"{"arg":{"channel":"orders","instId":"BTC-USDT"},"data":[{"ordId":"999","clOrdId":"other1","instId":"BTC-USDT","state":"filled","side":"buy","fillSz":"1","fillPx":"100","tradeId":"t1"}]}"#;
    assert!(h.router.handle_frame(raw).await.is_none());
    assert!(h.notifier.messages.lock().unwrap().is_empty());
    assert_eq!(h.manager.open_order_count(), 0);
}

#[tokio::test]
async fn price_limit_push_updates_band() {
    let h = harness();
    let raw = r#"{"arg":{"channel":"price-limit","instId":"BTC-USDT"},"data":[{"instId":"BTC-USDT","buyLmt":"105.5","sellLmt":"95.5"}]}"#;
    h.router.handle_frame(raw).await;
    let band = h.manager.price_limits.get("BTC-USDT").unwrap();
    assert_eq!(band.buy_limit, 105.5);
    assert_eq!(band.sell_limit, 95.5);
}

#[tokio::test]
async fn malformed_frames_never_panic() {
    let h = harness();
    for raw in [
        "",
        "pong",
        "not json at all",
        r#"{"arg":{"channel":"books","instId":"BTC-USDT"},"data":"not-an-array"}"#,
        r#"{"event":"error","code":"60018","msg":"unknown channel"}"#,
    ] {
        // Either dropped or answered; never a crash.
        let _ = h.router.handle_frame(raw).await;
    }
}
