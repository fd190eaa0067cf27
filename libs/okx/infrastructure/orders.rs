//! Order lifecycle management.
//!
//! Correlates engine order ids with venue order ids across the REST and
//! WebSocket surfaces. A single async gate serializes REST mutations against
//! the orders-channel push handler so a fill can never observe a cache the
//! placement path has not written yet; tickets are cached before the REST
//! call for the same reason.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::order::{
    OrderFill, OrderStatus, OrderStatusEvent, OrderTicket, OrderType, Side,
};
use crate::infrastructure::rest::types::{AmendRequest, CancelRequest, OrderRequest};
use crate::infrastructure::rest::RestClient;
use crate::infrastructure::tag;
use crate::infrastructure::ws::messages::{AccountPushData, OrderPushData, PositionPushData};
use crate::infrastructure::books::BookRegistry;
use crate::ports::{Notification, OrderNotifier, Severity, SymbolMapper};

/// Client-order-id prefix; the remainder is the engine order id in decimal.
const CL_ORD_PREFIX: &str = "adp";

/// Trade ids older than this fall out of the dedup window.
const TRADE_ID_EXPIRY: Duration = Duration::from_secs(300);

/// Dedup map size that triggers a prune pass.
const TRADE_ID_PRUNE_THRESHOLD: usize = 1000;

const FILL_EPSILON: f64 = 1e-9;

// ============================================================================
// Price limits
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PriceLimitBand {
    pub buy_limit: f64,
    pub sell_limit: f64,
}

/// Latest buy/sell price bands per instrument, fed by the price-limit
/// channel and REST lookups.
#[derive(Default)]
pub struct PriceLimitCache {
    bands: RwLock<HashMap<String, PriceLimitBand>>,
}

impl PriceLimitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, inst_id: &str, band: PriceLimitBand) {
        self.bands.write().insert(inst_id.to_string(), band);
    }

    pub fn get(&self, inst_id: &str) -> Option<PriceLimitBand> {
        self.bands.read().get(inst_id).copied()
    }
}

// ============================================================================
// Account state
// ============================================================================

/// Available balances per currency from the account channel.
#[derive(Default)]
pub struct BalanceCache {
    balances: RwLock<HashMap<String, f64>>,
}

impl BalanceCache {
    pub fn get(&self, ccy: &str) -> Option<f64> {
        self.balances.read().get(ccy).copied()
    }
}

/// Net positions per instrument from the positions channel.
#[derive(Default)]
pub struct PositionCache {
    positions: RwLock<HashMap<String, f64>>,
}

impl PositionCache {
    pub fn get(&self, inst_id: &str) -> Option<f64> {
        self.positions.read().get(inst_id).copied()
    }
}

// ============================================================================
// Lifecycle manager
// ============================================================================

#[derive(Default)]
struct OrderCache {
    tickets: HashMap<u64, OrderTicket>,
    internal_to_exchange: HashMap<u64, String>,
    exchange_to_internal: HashMap<String, u64>,
    cumulative_fills: HashMap<u64, f64>,
    processed_trades: HashMap<String, Instant>,
}

impl OrderCache {
    fn evict(&mut self, internal_id: u64) {
        self.tickets.remove(&internal_id);
        self.cumulative_fills.remove(&internal_id);
        if let Some(ord_id) = self.internal_to_exchange.remove(&internal_id) {
            self.exchange_to_internal.remove(&ord_id);
        }
    }
}

pub struct OrderLifecycleManager {
    rest: Arc<RestClient>,
    mapper: Arc<dyn SymbolMapper>,
    notifier: Arc<dyn OrderNotifier>,
    books: Arc<BookRegistry>,
    pub price_limits: Arc<PriceLimitCache>,
    pub balances: Arc<BalanceCache>,
    pub positions: Arc<PositionCache>,
    /// Serializes REST order mutations against the push handler.
    gate: Mutex<()>,
    inner: RwLock<OrderCache>,
    trade_id_expiry: Duration,
}

impl OrderLifecycleManager {
    pub fn new(
        rest: Arc<RestClient>,
        mapper: Arc<dyn SymbolMapper>,
        notifier: Arc<dyn OrderNotifier>,
        books: Arc<BookRegistry>,
    ) -> Self {
        Self {
            rest,
            mapper,
            notifier,
            books,
            price_limits: Arc::new(PriceLimitCache::new()),
            balances: Arc::new(BalanceCache::default()),
            positions: Arc::new(PositionCache::default()),
            gate: Mutex::new(()),
            inner: RwLock::new(OrderCache::default()),
            trade_id_expiry: TRADE_ID_EXPIRY,
        }
    }

    pub fn open_order_count(&self) -> usize {
        self.inner.read().tickets.len()
    }

    fn encode_cl_ord_id(internal_id: u64) -> String {
        format!("{}{}", CL_ORD_PREFIX, internal_id)
    }

    fn decode_cl_ord_id(cl_ord_id: &str) -> Option<u64> {
        cl_ord_id
            .strip_prefix(CL_ORD_PREFIX)
            .and_then(|rest| rest.parse::<u64>().ok())
    }

    fn emit(&self, internal_id: u64, symbol: &str, status: OrderStatus, filled: f64, fill: Option<OrderFill>) {
        self.notifier.on_order_event(OrderStatusEvent {
            internal_id,
            symbol: symbol.to_string(),
            status,
            filled,
            fill,
        });
    }

    fn reject(&self, ticket: &OrderTicket, code: &str, reason: String) {
        warn!("[Orders] Rejecting order {}: {}", ticket.internal_id, reason);
        self.notifier
            .on_message(Notification::new(Severity::Warning, code, reason));
        self.emit(ticket.internal_id, &ticket.symbol, OrderStatus::Invalid, 0.0, None);
        self.inner.write().evict(ticket.internal_id);
    }

    fn register_ticket(&self, ticket: &OrderTicket) {
        let mut cache = self.inner.write();
        cache.tickets.insert(ticket.internal_id, ticket.clone());
        cache.cumulative_fills.insert(ticket.internal_id, 0.0);
    }

    /// Best limit price that fully covers a market buy: the price of the
    /// deepest ask level the walk reaches, capped by the venue's buy band.
    fn market_buy_limit_price(&self, symbol: &str, inst_id: &str, quantity: f64) -> Option<f64> {
        let book = self.books.get(symbol)?;
        let asks = book.read().asks();
        let mut remaining = quantity;
        let mut price = None;
        for (px, sz) in asks {
            price = Some(px);
            remaining -= sz;
            if remaining <= FILL_EPSILON {
                break;
            }
        }
        if remaining > FILL_EPSILON {
            // Not enough visible depth.
            return None;
        }
        let price = price?;
        match self.price_limits.get(inst_id) {
            Some(band) if band.buy_limit > 0.0 => Some(price.min(band.buy_limit)),
            _ => Some(price),
        }
    }

    // ========================================================================
    // REST mutations. These never return an error to the caller: every
    // failure becomes an Invalid status plus a warning notification, the
    // same path a venue rejection takes.
    // ========================================================================

    pub async fn place_order(&self, ticket: OrderTicket) {
        let _permit = self.gate.lock().await;

        let Some(inst_id) = self.mapper.to_exchange(&ticket.symbol) else {
            self.register_ticket(&ticket);
            self.reject(&ticket, "unmapped", format!("no venue mapping for {}", ticket.symbol));
            return;
        };

        // Cache before the REST call: the fill push can arrive before the
        // REST response does.
        self.register_ticket(&ticket);

        let mut order_type = ticket.order_type;
        let mut price = ticket.price;

        // Market buys on cash accounts are sized in quote currency by the
        // venue; emulate a base-sized market buy with a marketable FOK limit.
        if order_type == OrderType::Market && ticket.side() == Side::Buy {
            match self.market_buy_limit_price(&ticket.symbol, &inst_id, ticket.abs_quantity()) {
                Some(px) => {
                    order_type = OrderType::Fok;
                    price = px;
                    debug!(
                        "[Orders] Market buy {} rewritten to FOK limit @ {}",
                        ticket.internal_id, px
                    );
                }
                None => {
                    self.reject(
                        &ticket,
                        "no-depth",
                        format!("insufficient book depth for market buy on {}", ticket.symbol),
                    );
                    return;
                }
            }
        }

        let request = OrderRequest {
            inst_id,
            td_mode: "cash".to_string(),
            cl_ord_id: Self::encode_cl_ord_id(ticket.internal_id),
            side: ticket.side().as_wire().to_string(),
            ord_type: order_type.as_wire().to_string(),
            sz: format_qty(ticket.abs_quantity()),
            px: match order_type {
                OrderType::Market => None,
                _ => Some(format_qty(price)),
            },
            tag: tag::hash(&ticket.tag),
        };

        match self.rest.place_order(&request).await {
            Ok(resp) if resp.is_ok() => {
                {
                    let mut cache = self.inner.write();
                    cache
                        .internal_to_exchange
                        .insert(ticket.internal_id, resp.ord_id.clone());
                    cache
                        .exchange_to_internal
                        .insert(resp.ord_id.clone(), ticket.internal_id);
                }
                info!(
                    "[Orders] Placed {} as venue order {}",
                    ticket.internal_id, resp.ord_id
                );
                self.emit(ticket.internal_id, &ticket.symbol, OrderStatus::Submitted, 0.0, None);
            }
            Ok(resp) => {
                self.reject(&ticket, &resp.s_code, resp.s_msg);
            }
            Err(e) => {
                self.reject(&ticket, "transport", e.to_string());
            }
        }
    }

    pub async fn amend_order(&self, internal_id: u64, new_quantity: Option<f64>, new_price: Option<f64>) {
        let _permit = self.gate.lock().await;

        let Some(ticket) = self.inner.read().tickets.get(&internal_id).cloned() else {
            self.notifier.on_message(Notification::new(
                Severity::Warning,
                "unknown-order",
                format!("amend for unknown order {}", internal_id),
            ));
            return;
        };
        let Some(inst_id) = self.mapper.to_exchange(&ticket.symbol) else {
            return;
        };

        let request = AmendRequest {
            inst_id,
            cl_ord_id: Self::encode_cl_ord_id(internal_id),
            new_sz: new_quantity.map(|q| format_qty(q.abs())),
            new_px: new_price.map(format_qty),
        };

        match self.rest.amend_order(&request).await {
            Ok(resp) if resp.is_ok() => {
                if let Some(q) = new_quantity {
                    if let Some(t) = self.inner.write().tickets.get_mut(&internal_id) {
                        t.quantity = q;
                    }
                }
                let filled = self
                    .inner
                    .read()
                    .cumulative_fills
                    .get(&internal_id)
                    .copied()
                    .unwrap_or(0.0);
                self.emit(internal_id, &ticket.symbol, OrderStatus::UpdateSubmitted, filled, None);
            }
            Ok(resp) => {
                self.notifier.on_message(Notification::new(
                    Severity::Warning,
                    &resp.s_code,
                    format!("amend of {} rejected: {}", internal_id, resp.s_msg),
                ));
            }
            Err(e) => {
                self.notifier.on_message(Notification::new(
                    Severity::Warning,
                    "transport",
                    format!("amend of {} failed: {}", internal_id, e),
                ));
            }
        }
    }

    pub async fn cancel_order(&self, internal_id: u64) {
        let _permit = self.gate.lock().await;

        let (ticket, ord_id) = {
            let cache = self.inner.read();
            (
                cache.tickets.get(&internal_id).cloned(),
                cache.internal_to_exchange.get(&internal_id).cloned(),
            )
        };
        let (Some(ticket), Some(ord_id)) = (ticket, ord_id) else {
            self.notifier.on_message(Notification::new(
                Severity::Warning,
                "unknown-order",
                format!("cancel for unknown or unacknowledged order {}", internal_id),
            ));
            return;
        };
        let Some(inst_id) = self.mapper.to_exchange(&ticket.symbol) else {
            return;
        };

        let request = CancelRequest { inst_id, ord_id };
        match self.rest.cancel_order(&request).await {
            // Canceled status arrives via the orders channel.
            Ok(resp) if resp.is_ok() => {
                debug!("[Orders] Cancel accepted for {}", internal_id);
            }
            Ok(resp) => {
                self.notifier.on_message(Notification::new(
                    Severity::Warning,
                    &resp.s_code,
                    format!("cancel of {} rejected: {}", internal_id, resp.s_msg),
                ));
            }
            Err(e) => {
                self.notifier.on_message(Notification::new(
                    Severity::Warning,
                    "transport",
                    format!("cancel of {} failed: {}", internal_id, e),
                ));
            }
        }
    }

    // ========================================================================
    // Push handlers
    // ========================================================================

    /// Fold one orders-channel item into the cache. Runs under the same gate
    /// as the REST mutations.
    pub async fn handle_order_push(&self, data: OrderPushData) {
        let _permit = self.gate.lock().await;
        self.apply_order_push(data);
    }

    fn apply_order_push(&self, data: OrderPushData) {
        let internal_id = Self::decode_cl_ord_id(&data.cl_ord_id).or_else(|| {
            self.inner
                .read()
                .exchange_to_internal
                .get(&data.ord_id)
                .copied()
        });
        let Some(internal_id) = internal_id else {
            // Orders from an earlier session or another client on the same
            // account; not ours to report.
            debug!("[Orders] Ignoring push for foreign order {}", data.ord_id);
            return;
        };

        let Some(ticket) = self.inner.read().tickets.get(&internal_id).cloned() else {
            debug!(
                "[Orders] Push for already-evicted order {} ({})",
                internal_id, data.state
            );
            return;
        };

        // Record the venue id if the push beat the REST response.
        if !data.ord_id.is_empty() {
            let mut cache = self.inner.write();
            cache
                .internal_to_exchange
                .entry(internal_id)
                .or_insert_with(|| data.ord_id.clone());
            cache
                .exchange_to_internal
                .entry(data.ord_id.clone())
                .or_insert(internal_id);
        }

        let fill = self.extract_fill(&data);
        let mut filled = self
            .inner
            .read()
            .cumulative_fills
            .get(&internal_id)
            .copied()
            .unwrap_or(0.0);

        if let Some(ref fill) = fill {
            filled += fill.quantity;
            self.inner
                .write()
                .cumulative_fills
                .insert(internal_id, filled);
        }

        let fully_filled = data.state == "filled"
            || filled + FILL_EPSILON >= ticket.abs_quantity();

        let status = match data.state.as_str() {
            "canceled" => OrderStatus::Canceled,
            "filled" => OrderStatus::Filled,
            _ if fill.is_some() && fully_filled => OrderStatus::Filled,
            _ if fill.is_some() => OrderStatus::PartiallyFilled,
            // A plain `live` echo after placement carries no new state.
            _ => return,
        };

        if status.is_terminal() {
            self.inner.write().evict(internal_id);
        }
        self.emit(internal_id, &ticket.symbol, status, filled, fill);
    }

    /// Extract a deduplicated fill from a push, if it carries one.
    fn extract_fill(&self, data: &OrderPushData) -> Option<OrderFill> {
        if data.trade_id.is_empty() {
            return None;
        }
        let quantity = data.fill_sz.parse::<f64>().ok().filter(|q| *q > 0.0)?;
        let price = data.fill_px.parse::<f64>().unwrap_or(0.0);

        {
            let mut cache = self.inner.write();
            let now = Instant::now();
            // Only a trade id seen within the expiry window is a duplicate;
            // the venue can legitimately reuse ids across sessions.
            if let Some(seen) = cache.processed_trades.get(&data.trade_id) {
                if now.duration_since(*seen) < self.trade_id_expiry {
                    debug!("[Orders] Duplicate trade {} dropped", data.trade_id);
                    return None;
                }
            }
            if cache.processed_trades.len() >= TRADE_ID_PRUNE_THRESHOLD {
                let expiry = self.trade_id_expiry;
                cache
                    .processed_trades
                    .retain(|_, seen| now.duration_since(*seen) < expiry);
            }
            cache.processed_trades.insert(data.trade_id.clone(), now);
        }

        Some(OrderFill {
            trade_id: data.trade_id.clone(),
            price,
            quantity,
            timestamp_ms: data.u_time.parse::<i64>().unwrap_or(0),
        })
    }

    pub fn handle_account_push(&self, data: AccountPushData) {
        let mut balances = self.balances.balances.write();
        for detail in data.details {
            if let Ok(avail) = detail.avail_bal.parse::<f64>() {
                balances.insert(detail.ccy, avail);
            }
        }
    }

    pub fn handle_position_push(&self, data: PositionPushData) {
        if let Ok(pos) = data.pos.parse::<f64>() {
            self.positions.positions.write().insert(data.inst_id, pos);
        }
    }

    pub fn handle_price_limit(&self, inst_id: &str, buy_lmt: &str, sell_lmt: &str) {
        let buy = buy_lmt.parse::<f64>().unwrap_or(0.0);
        let sell = sell_lmt.parse::<f64>().unwrap_or(0.0);
        self.price_limits.update(
            inst_id,
            PriceLimitBand {
                buy_limit: buy,
                sell_limit: sell,
            },
        );
    }
}

/// Trim trailing zeros so sizes serialize the way the venue formats them.
fn format_qty(value: f64) -> String {
    let mut s = format!("{:.8}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orderbook::{OrderBook, PriceLevel};
    use crate::infrastructure::auth::OkxSigner;
    use crate::infrastructure::config::OkxCredentials;
    use crate::ports::StaticSymbolMapper;
    use std::sync::Mutex as StdMutex;

    struct RecordingNotifier {
        events: StdMutex<Vec<OrderStatusEvent>>,
        messages: StdMutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: StdMutex::new(Vec::new()),
                messages: StdMutex::new(Vec::new()),
            })
        }

        fn statuses(&self) -> Vec<OrderStatus> {
            self.events.lock().unwrap().iter().map(|e| e.status).collect()
        }
    }

    impl OrderNotifier for RecordingNotifier {
        fn on_order_event(&self, event: OrderStatusEvent) {
            self.events.lock().unwrap().push(event);
        }
        fn on_message(&self, notification: Notification) {
            self.messages.lock().unwrap().push(notification);
        }
    }

    fn manager(notifier: Arc<RecordingNotifier>) -> OrderLifecycleManager {
        let signer = Arc::new(OkxSigner::new(OkxCredentials::default()));
        let rest = Arc::new(RestClient::new(
            "http://localhost:0".to_string(),
            signer,
            false,
        ));
        OrderLifecycleManager::new(
            rest,
            Arc::new(StaticSymbolMapper::new(&[("BTCUSDT", "BTC-USDT")])),
            notifier,
            Arc::new(BookRegistry::new()),
        )
    }

    fn ticket(id: u64, qty: f64) -> OrderTicket {
        OrderTicket {
            internal_id: id,
            symbol: "BTCUSDT".to_string(),
            quantity: qty,
            order_type: OrderType::Limit,
            price: 100.0,
            tag: String::new(),
        }
    }

    fn push(cl_ord_id: &str, state: &str, trade_id: &str, fill_sz: &str) -> OrderPushData {
        OrderPushData {
            ord_id: "venue-1".to_string(),
            cl_ord_id: cl_ord_id.to_string(),
            inst_id: "BTC-USDT".to_string(),
            state: state.to_string(),
            side: "buy".to_string(),
            sz: "1".to_string(),
            px: "100".to_string(),
            fill_sz: fill_sz.to_string(),
            fill_px: "100".to_string(),
            trade_id: trade_id.to_string(),
            acc_fill_sz: String::new(),
            u_time: "1700000000000".to_string(),
        }
    }

    #[test]
    fn test_cl_ord_id_round_trip() {
        let encoded = OrderLifecycleManager::encode_cl_ord_id(42);
        assert_eq!(encoded, "adp42");
        assert_eq!(OrderLifecycleManager::decode_cl_ord_id(&encoded), Some(42));
        assert_eq!(OrderLifecycleManager::decode_cl_ord_id("other99"), None);
        assert_eq!(OrderLifecycleManager::decode_cl_ord_id("adpxyz"), None);
    }

    #[test]
    fn test_fill_accumulates_to_terminal() {
        let notifier = RecordingNotifier::new();
        let m = manager(Arc::clone(&notifier));
        m.register_ticket(&ticket(7, 1.0));

        m.apply_order_push(push("adp7", "partially_filled", "t1", "0.4"));
        m.apply_order_push(push("adp7", "partially_filled", "t2", "0.6"));

        assert_eq!(
            notifier.statuses(),
            vec![OrderStatus::PartiallyFilled, OrderStatus::Filled]
        );
        let events = notifier.events.lock().unwrap();
        assert!((events[1].filled - 1.0).abs() < 1e-9);
        drop(events);
        // Terminal status evicted the order.
        assert_eq!(m.open_order_count(), 0);
    }

    #[test]
    fn test_duplicate_trade_id_dropped() {
        let notifier = RecordingNotifier::new();
        let m = manager(Arc::clone(&notifier));
        m.register_ticket(&ticket(7, 2.0));

        m.apply_order_push(push("adp7", "partially_filled", "t1", "0.5"));
        m.apply_order_push(push("adp7", "partially_filled", "t1", "0.5"));

        // Second push is a duplicate: no fill extracted, no status change.
        assert_eq!(notifier.statuses(), vec![OrderStatus::PartiallyFilled]);
        let events = notifier.events.lock().unwrap();
        assert!((events[0].filled - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_trade_id_reuse_after_expiry_is_new_fill() {
        let notifier = RecordingNotifier::new();
        let mut m = manager(Arc::clone(&notifier));
        // Zero window: every entry is already expired on the next push.
        m.trade_id_expiry = Duration::ZERO;
        m.register_ticket(&ticket(7, 1.0));

        m.apply_order_push(push("adp7", "partially_filled", "t1", "0.4"));
        m.apply_order_push(push("adp7", "partially_filled", "t1", "0.6"));

        // The reused id fell outside the window, so the second push counted.
        assert_eq!(
            notifier.statuses(),
            vec![OrderStatus::PartiallyFilled, OrderStatus::Filled]
        );
        let events = notifier.events.lock().unwrap();
        assert!((events[1].filled - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_foreign_order_ignored() {
        let notifier = RecordingNotifier::new();
        let m = manager(Arc::clone(&notifier));

        // No clOrdId prefix match, no known venue id: stale-session order.
        m.apply_order_push(push("someone-else", "filled", "t9", "1"));
        assert!(notifier.statuses().is_empty());
        assert!(notifier.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_push_terminal() {
        let notifier = RecordingNotifier::new();
        let m = manager(Arc::clone(&notifier));
        m.register_ticket(&ticket(9, 1.0));

        m.apply_order_push(push("adp9", "canceled", "", ""));
        assert_eq!(notifier.statuses(), vec![OrderStatus::Canceled]);
        assert_eq!(m.open_order_count(), 0);
    }

    #[test]
    fn test_live_echo_is_silent() {
        let notifier = RecordingNotifier::new();
        let m = manager(Arc::clone(&notifier));
        m.register_ticket(&ticket(3, 1.0));

        m.apply_order_push(push("adp3", "live", "", ""));
        assert!(notifier.statuses().is_empty());
        assert_eq!(m.open_order_count(), 1);
    }

    #[test]
    fn test_market_buy_walk_picks_covering_level() {
        let notifier = RecordingNotifier::new();
        let m = manager(notifier);

        let mut book = OrderBook::new("BTC-USDT", None);
        book.apply_snapshot(
            &[PriceLevel::new("99", "1")],
            &[PriceLevel::new("100", "0.6"), PriceLevel::new("101", "0.5")],
        );
        m.books
            .insert("BTCUSDT".to_string(), Arc::new(RwLock::new(book)));

        // 1.0 needs both levels; marketable price is the second level.
        assert_eq!(m.market_buy_limit_price("BTCUSDT", "BTC-USDT", 1.0), Some(101.0));
        // 0.5 is covered by the first level alone.
        assert_eq!(m.market_buy_limit_price("BTCUSDT", "BTC-USDT", 0.5), Some(100.0));
        // More than total visible depth: no price.
        assert_eq!(m.market_buy_limit_price("BTCUSDT", "BTC-USDT", 5.0), None);

        // Venue buy band caps the walk.
        m.handle_price_limit("BTC-USDT", "100.5", "95");
        assert_eq!(m.market_buy_limit_price("BTCUSDT", "BTC-USDT", 1.0), Some(100.5));
    }

    #[test]
    fn test_push_before_rest_response_resolves_by_cl_ord_id() {
        let notifier = RecordingNotifier::new();
        let m = manager(Arc::clone(&notifier));
        // Ticket cached, REST response not yet processed: no venue id known.
        m.register_ticket(&ticket(11, 0.5));

        m.apply_order_push(push("adp11", "filled", "t5", "0.5"));
        assert_eq!(notifier.statuses(), vec![OrderStatus::Filled]);
    }

    #[test]
    fn test_format_qty_trims() {
        assert_eq!(format_qty(1.0), "1");
        assert_eq!(format_qty(0.5), "0.5");
        assert_eq!(format_qty(0.10000000), "0.1");
        assert_eq!(format_qty(12.34560000), "12.3456");
    }
}
