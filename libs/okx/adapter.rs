//! The assembled adapter.
//!
//! Owns the REST client, the two WebSocket sessions (public market data,
//! private order flow), the per-symbol book synchronizer and the order
//! lifecycle manager. Reconnection policy belongs to the host engine: on a
//! lost socket the adapter emits a disconnect notification and waits for a
//! `connect` call rather than dialing on its own.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use keysync::KeyedSynchronizer;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::domain::order::{OrderTicket, Side};
use crate::domain::tick::TradeTick;
use crate::infrastructure::auth::OkxSigner;
use crate::infrastructure::books::{BookDriver, BookRegistry, SharedBook};
use crate::infrastructure::config::OkxConfig;
use crate::infrastructure::orders::OrderLifecycleManager;
use crate::infrastructure::rest::types::HistoryTrade;
use crate::infrastructure::rest::RestClient;
use crate::infrastructure::ws::connection::{login_msg, subscribe_msg, unsubscribe_msg, ConnState, LastSeen};
use crate::infrastructure::ws::messages::{Channel, PushArg};
use crate::infrastructure::ws::router::{RouterAction, WsRouter};
use crate::ports::{OrderNotifier, SymbolMapper, TickSink};

/// The socket is considered dead after this long without any inbound frame.
const STALE_SOCKET: Duration = Duration::from_secs(60);

struct Session {
    tx: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

impl Session {
    fn idle() -> Self {
        Self { tx: None, task: None }
    }

    fn send(&self, frame: String) -> bool {
        match &self.tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    fn teardown(&mut self) {
        self.tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct OkxAdapter {
    config: OkxConfig,
    signer: Arc<OkxSigner>,
    rest: Arc<RestClient>,
    mapper: Arc<dyn SymbolMapper>,
    sink: Arc<dyn TickSink>,
    registry: Arc<BookRegistry>,
    manager: Arc<OrderLifecycleManager>,
    sync: Arc<KeyedSynchronizer<BookDriver>>,
    router: Arc<WsRouter>,
    public: RwLock<Session>,
    private: RwLock<Session>,
}

impl OkxAdapter {
    pub fn new(
        config: OkxConfig,
        mapper: Arc<dyn SymbolMapper>,
        sink: Arc<dyn TickSink>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let signer = Arc::new(OkxSigner::new(config.credentials.clone()));
        let rest = Arc::new(RestClient::new(
            config.rest_url.clone(),
            Arc::clone(&signer),
            config.simulated,
        ));
        let registry = Arc::new(BookRegistry::new());
        let manager = Arc::new(OrderLifecycleManager::new(
            Arc::clone(&rest),
            Arc::clone(&mapper),
            Arc::clone(&notifier),
            Arc::clone(&registry),
        ));
        let driver = Arc::new(BookDriver::new(
            Arc::clone(&rest),
            Arc::clone(&mapper),
            Arc::clone(&sink),
            Arc::clone(&registry),
            config.book_depth,
            config.max_book_depth,
            25,
            config.strict_checksum,
        ));
        let sync = Arc::new(KeyedSynchronizer::with_capacity(
            driver,
            config.queue_capacity,
        ));
        let router = Arc::new(WsRouter::new(
            mapper.clone(),
            Arc::clone(&sink),
            notifier,
            Arc::clone(&manager),
            Arc::clone(&sync),
        ));

        Self {
            config,
            signer,
            rest,
            mapper,
            sink,
            registry,
            manager,
            sync,
            router,
            public: RwLock::new(Session::idle()),
            private: RwLock::new(Session::idle()),
        }
    }

    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    pub fn orders(&self) -> &Arc<OrderLifecycleManager> {
        &self.manager
    }

    /// Live book for a symbol, if one has been established. Readers must
    /// tolerate a book that is mid-resync.
    pub fn book(&self, symbol: &str) -> Option<SharedBook> {
        self.registry.get(symbol)
    }

    pub fn is_streaming(&self) -> bool {
        self.router.state.is_streaming()
    }

    /// Feed one raw frame through the router, exactly as the session loops
    /// do. Useful for driving the adapter from recorded traffic.
    pub async fn handle_frame(&self, text: &str) -> Option<RouterAction> {
        self.router.handle_frame(text).await
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Establish the WebSocket sessions. Called once at startup and again by
    /// the host engine after each disconnect notification.
    pub async fn connect(&self) -> anyhow::Result<()> {
        self.rest
            .sync_time()
            .await
            .context("server clock synchronization failed")?;

        self.spawn_session(&self.config.ws_public_url, false)
            .await?;

        if self.config.credentials.is_configured() {
            for channel in ["orders", "account", "positions"] {
                self.router.track_subscription(PushArg::new(channel, ""));
            }
            self.spawn_session(&self.config.ws_private_url, true)
                .await?;
        } else {
            info!("[Adapter] No credentials; running public market data only");
            self.router.state.set(ConnState::Streaming);
        }
        Ok(())
    }

    async fn spawn_session(&self, url: &str, is_private: bool) -> anyhow::Result<()> {
        self.router.state.set(ConnState::Connecting);
        let (stream, _) = match connect_async(url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.router.state.set(ConnState::Disconnected);
                return Err(e).with_context(|| format!("WebSocket dial failed: {}", url));
            }
        };
        info!("[Adapter] Connected to {}", url);

        let (tx, rx) = mpsc::unbounded_channel::<String>();

        if is_private {
            self.router.state.set(ConnState::Authenticating);
            tx.send(login_msg(&self.signer)?)
                .map_err(|_| anyhow::anyhow!("session channel closed before login"))?;
        } else {
            self.router.state.set(ConnState::Subscribing);
            // Public channels need no login; replay any tracked public
            // subscriptions immediately (reconnect case).
            let subs: Vec<PushArg> = self
                .router
                .tracked_subscriptions()
                .into_iter()
                .filter(|arg| !Channel::parse(&arg.channel).is_private())
                .collect();
            if !subs.is_empty() {
                let _ = tx.send(subscribe_msg(&subs));
            }
        }

        let router = Arc::clone(&self.router);
        let ping_interval = Duration::from_secs(self.config.ping_interval_secs);
        let task = tokio::spawn(run_session(stream, rx, router, ping_interval));

        let session = if is_private { &self.private } else { &self.public };
        let mut session = session.write();
        session.teardown();
        *session = Session {
            tx: Some(tx),
            task: Some(task),
        };
        Ok(())
    }

    /// Tear both sessions down and stop every book consumer.
    pub fn shutdown(&self) {
        self.public.write().teardown();
        self.private.write().teardown();
        self.sync.shutdown();
        self.router.state.set(ConnState::Disconnected);
    }

    // ========================================================================
    // Market data subscriptions
    // ========================================================================

    /// Subscribe the books, tickers and trades channels for a symbol.
    pub fn subscribe(&self, symbol: &str) -> anyhow::Result<()> {
        let inst_id = self
            .mapper
            .to_exchange(symbol)
            .ok_or_else(|| anyhow::anyhow!("no venue mapping for {}", symbol))?;
        let args = vec![
            PushArg::new("books", &inst_id),
            PushArg::new("tickers", &inst_id),
            PushArg::new("trades", &inst_id),
        ];
        for arg in &args {
            self.router.track_subscription(arg.clone());
        }
        if !self.public.read().send(subscribe_msg(&args)) {
            warn!("[Adapter] Subscribe for {} queued until next connect", symbol);
        }
        Ok(())
    }

    pub fn unsubscribe(&self, symbol: &str) -> anyhow::Result<()> {
        let inst_id = self
            .mapper
            .to_exchange(symbol)
            .ok_or_else(|| anyhow::anyhow!("no venue mapping for {}", symbol))?;
        let args = vec![
            PushArg::new("books", &inst_id),
            PushArg::new("tickers", &inst_id),
            PushArg::new("trades", &inst_id),
        ];
        for arg in &args {
            self.router.untrack_subscription(arg);
        }
        self.public.read().send(unsubscribe_msg(&args));
        self.sync.remove(&symbol.to_string());
        self.registry.remove(symbol);
        Ok(())
    }

    // ========================================================================
    // Backfill and reference data
    // ========================================================================

    /// Instrument ids currently live for trading. Used by diagnostics to
    /// sanity-check requested symbols before subscribing.
    pub async fn live_instruments(&self, inst_type: &str) -> anyhow::Result<Vec<String>> {
        let instruments = self.rest.instruments(inst_type).await?;
        Ok(instruments
            .into_iter()
            .filter(|i| i.state == "live")
            .map(|i| i.inst_id)
            .collect())
    }

    /// Replay recent public trades through the tick sink, oldest first, so a
    /// freshly subscribed symbol starts with history behind it. Returns the
    /// number of ticks emitted.
    pub async fn backfill_trades(&self, symbol: &str, limit: usize) -> anyhow::Result<usize> {
        let inst_id = self
            .mapper
            .to_exchange(symbol)
            .ok_or_else(|| anyhow::anyhow!("no venue mapping for {}", symbol))?;
        let trades = self.rest.history_trades(&inst_id, limit).await?;

        let mut emitted = 0;
        // The venue returns newest first.
        for trade in trades.iter().rev() {
            if let Some(tick) = history_to_tick(symbol, trade) {
                self.sink.on_trade(tick);
                emitted += 1;
            }
        }
        info!("[Adapter] Backfilled {} trades for {}", emitted, symbol);
        Ok(emitted)
    }

    // ========================================================================
    // Order flow
    // ========================================================================

    pub async fn place_order(&self, ticket: OrderTicket) {
        self.manager.place_order(ticket).await;
    }

    pub async fn amend_order(
        &self,
        internal_id: u64,
        new_quantity: Option<f64>,
        new_price: Option<f64>,
    ) {
        self.manager
            .amend_order(internal_id, new_quantity, new_price)
            .await;
    }

    pub async fn cancel_order(&self, internal_id: u64) {
        self.manager.cancel_order(internal_id).await;
    }
}

/// Convert one historical trade row into a normalized tick; rows with
/// unparseable fields are skipped.
fn history_to_tick(symbol: &str, trade: &HistoryTrade) -> Option<TradeTick> {
    Some(TradeTick {
        symbol: symbol.to_string(),
        price: trade.px.parse::<f64>().ok()?,
        size: trade.sz.parse::<f64>().ok()?,
        aggressor: Side::from_str(&trade.side)?,
        timestamp_ms: trade.ts.parse::<i64>().ok()?,
    })
}

/// One WebSocket session: reads frames into the router, writes queued
/// outbound frames, keeps the venue's text heartbeat. Exits on socket loss
/// or a router-requested teardown; never redials on its own.
async fn run_session(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut rx: mpsc::UnboundedReceiver<String>,
    router: Arc<WsRouter>,
    ping_interval: Duration,
) {
    let (mut write, mut read) = stream.split();
    let last_seen = LastSeen::new();
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_seen.touch();
                        match router.handle_frame(&text).await {
                            Some(RouterAction::SendText(reply)) => {
                                if write.send(Message::Text(reply.into())).await.is_err() {
                                    break;
                                }
                            }
                            Some(RouterAction::Reconnect) => {
                                debug!("[Adapter] Router requested session teardown");
                                break;
                            }
                            None => {}
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_seen.touch();
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("[Adapter] WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if write.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping.tick() => {
                if last_seen.elapsed() > STALE_SOCKET {
                    warn!("[Adapter] No frames for {:?}; treating socket as dead", STALE_SOCKET);
                    break;
                }
                if write.send(Message::Text("ping".into())).await.is_err() {
                    break;
                }
            }
        }
    }

    router.mark_disconnected();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{NoOpOrderNotifier, NoOpTickSink, StaticSymbolMapper};

    fn adapter() -> OkxAdapter {
        let mut config = OkxConfig::public();
        config.rest_url = "http://localhost:0".to_string();
        OkxAdapter::new(
            config,
            Arc::new(StaticSymbolMapper::new(&[("BTCUSDT", "BTC-USDT")])),
            Arc::new(NoOpTickSink),
            Arc::new(NoOpOrderNotifier),
        )
    }

    #[test]
    fn test_subscribe_tracks_channels() {
        let a = adapter();
        a.subscribe("BTCUSDT").unwrap();
        let subs = a.router.tracked_subscriptions();
        assert_eq!(subs.len(), 3);
        assert!(subs.iter().any(|s| s.channel == "books"));
        assert!(subs.iter().all(|s| s.inst_id == "BTC-USDT"));

        a.unsubscribe("BTCUSDT").unwrap();
        assert!(a.router.tracked_subscriptions().is_empty());
    }

    #[test]
    fn test_subscribe_unknown_symbol_errors() {
        let a = adapter();
        assert!(a.subscribe("DOGEUSDT").is_err());
    }

    #[test]
    fn test_no_book_before_subscription() {
        let a = adapter();
        assert!(a.book("BTCUSDT").is_none());
        assert!(!a.is_streaming());
    }

    #[test]
    fn test_history_trade_conversion() {
        let trade = HistoryTrade {
            trade_id: "9001".to_string(),
            px: "41006.8".to_string(),
            sz: "0.25".to_string(),
            side: "sell".to_string(),
            ts: "1629966436396".to_string(),
        };
        let tick = history_to_tick("BTCUSDT", &trade).unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, 41006.8);
        assert_eq!(tick.size, 0.25);
        assert_eq!(tick.aggressor, Side::Sell);
        assert_eq!(tick.timestamp_ms, 1629966436396);

        // Unparseable rows are skipped rather than propagated.
        let bad = HistoryTrade {
            px: "not-a-price".to_string(),
            ..trade
        };
        assert!(history_to_tick("BTCUSDT", &bad).is_none());
    }

    async fn local_ws_server() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                let _ = tokio_tungstenite::accept_async(socket).await;
                // Keep the socket open until the test ends.
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_public_session_advances_through_connecting() {
        let a = adapter();
        let addr = local_ws_server().await;
        a.spawn_session(&format!("ws://{}", addr), false)
            .await
            .unwrap();
        // Public sockets need no login; the dial lands in Subscribing.
        assert_eq!(a.router.state.get(), ConnState::Subscribing);
        a.shutdown();
    }

    #[tokio::test]
    async fn test_private_session_enters_authenticating() {
        let a = adapter();
        let addr = local_ws_server().await;
        a.spawn_session(&format!("ws://{}", addr), true)
            .await
            .unwrap();
        assert_eq!(a.router.state.get(), ConnState::Authenticating);
        a.shutdown();
    }

    #[tokio::test]
    async fn test_failed_dial_resets_to_disconnected() {
        let a = adapter();
        let result = a.spawn_session("ws://127.0.0.1:1", false).await;
        assert!(result.is_err());
        assert_eq!(a.router.state.get(), ConnState::Disconnected);
    }
}
