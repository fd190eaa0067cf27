//! Sequenced order-book maintenance.
//!
//! `BookDriver` plugs the venue's books channel into a [`KeyedSynchronizer`]:
//! `initialize` pulls a REST snapshot, `reduce` folds sequenced deltas with
//! gap and checksum detection, and every applied batch is published through
//! the tick sink. Live books are also exposed through a registry so the
//! order path can consult depth without touching the consumer task.
//!
//! REST snapshots carry no sequence number, so a freshly initialized book
//! starts at sequence 0 and the first WebSocket delta establishes the
//! baseline unconditionally.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use keysync::{Reduction, SyncDriver, SyncError};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::checksum;
use crate::domain::orderbook::{OrderBook, PriceLevel};
use crate::domain::tick::{DepthSnapshot, QuoteTick};
use crate::infrastructure::rest::RestClient;
use crate::ports::{SymbolMapper, TickSink};

/// Sentinel `prevSeqId` marking the first delta after a venue-side service
/// restart.
const SNAPSHOT_SENTINEL: i64 = -1;

pub type SharedBook = Arc<RwLock<OrderBook>>;

/// Live books keyed by internal symbol. Readers outside the consumer task
/// (order sizing, diagnostics) must treat contents as possibly mid-resync.
#[derive(Default)]
pub struct BookRegistry {
    books: DashMap<String, SharedBook>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<SharedBook> {
        self.books.get(symbol).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, symbol: String, book: SharedBook) {
        self.books.insert(symbol, book);
    }

    pub fn remove(&self, symbol: &str) {
        self.books.remove(symbol);
    }
}

/// Per-symbol synchronizer state: the shared book plus sequencing metadata.
pub struct SyncedBook {
    pub book: SharedBook,
    /// Last applied sequence; 0 until the first delta lands.
    pub last_seq: i64,
    /// Whether the latest applied batch moved the top of book.
    pub best_changed: bool,
    pub last_ts: i64,
}

/// One books-channel item, already parsed off the wire.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub action: BookAction,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub seq_id: i64,
    pub prev_seq_id: i64,
    pub checksum: Option<i32>,
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAction {
    Snapshot,
    Update,
}

pub struct BookDriver {
    rest: Arc<RestClient>,
    mapper: Arc<dyn SymbolMapper>,
    sink: Arc<dyn TickSink>,
    registry: Arc<BookRegistry>,
    snapshot_depth: usize,
    max_book_depth: Option<usize>,
    checksum_depth: usize,
    strict_checksum: bool,
}

impl BookDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rest: Arc<RestClient>,
        mapper: Arc<dyn SymbolMapper>,
        sink: Arc<dyn TickSink>,
        registry: Arc<BookRegistry>,
        snapshot_depth: usize,
        max_book_depth: Option<usize>,
        checksum_depth: usize,
        strict_checksum: bool,
    ) -> Self {
        Self {
            rest,
            mapper,
            sink,
            registry,
            snapshot_depth,
            max_book_depth,
            checksum_depth,
            strict_checksum,
        }
    }

    fn verify_checksum(&self, symbol: &str, book: &OrderBook, wire: i32) -> Result<(), SyncError> {
        let outcome = checksum::validate(book, wire, self.checksum_depth);
        if outcome.ok {
            return Ok(());
        }
        if self.strict_checksum {
            Err(SyncError::ChecksumMismatch {
                wire,
                calculated: outcome.calculated,
            })
        } else {
            error!(
                "[Book] Checksum mismatch on {}: wire={} calculated={} (continuing)",
                symbol, wire, outcome.calculated
            );
            Ok(())
        }
    }
}

#[async_trait]
impl SyncDriver for BookDriver {
    type Key = String;
    type State = SyncedBook;
    type Update = BookUpdate;

    async fn initialize(&self, symbol: &String) -> Result<SyncedBook, SyncError> {
        let inst_id = self
            .mapper
            .to_exchange(symbol)
            .ok_or_else(|| SyncError::Initialization(format!("unmapped symbol {}", symbol)))?;

        let snapshot = self
            .rest
            .books(&inst_id, self.snapshot_depth)
            .await
            .map_err(|e| SyncError::Initialization(e.to_string()))?;

        let bids: Vec<PriceLevel> = snapshot
            .bids
            .iter()
            .filter_map(|row| PriceLevel::from_wire(row))
            .collect();
        let asks: Vec<PriceLevel> = snapshot
            .asks
            .iter()
            .filter_map(|row| PriceLevel::from_wire(row))
            .collect();

        let mut book = OrderBook::new(inst_id, self.max_book_depth);
        book.apply_snapshot(&bids, &asks);
        let ts = snapshot.ts.parse::<i64>().unwrap_or(0);

        info!(
            "[Book] Snapshot for {}: {} bids / {} asks",
            symbol,
            book.bid_count(),
            book.ask_count()
        );

        let shared = Arc::new(RwLock::new(book));
        self.registry.insert(symbol.clone(), Arc::clone(&shared));

        Ok(SyncedBook {
            book: shared,
            last_seq: 0,
            best_changed: true,
            last_ts: ts,
        })
    }

    fn reduce(
        &self,
        symbol: &String,
        state: &mut SyncedBook,
        update: BookUpdate,
    ) -> Result<Reduction, SyncError> {
        // Full replacement: an explicit snapshot push or the sentinel that
        // follows a venue-side restart.
        if update.action == BookAction::Snapshot || update.prev_seq_id == SNAPSHOT_SENTINEL {
            let best_changed = {
                let mut book = state.book.write();
                book.apply_snapshot(&update.bids, &update.asks)
            };
            if let Some(wire) = update.checksum {
                self.verify_checksum(symbol, &state.book.read(), wire)?;
            }
            state.last_seq = update.seq_id;
            state.best_changed = best_changed;
            state.last_ts = update.ts;
            return Ok(Reduction::Applied);
        }

        // Keepalive: the venue repeats the last sequence when nothing traded.
        if update.prev_seq_id == update.seq_id {
            debug!("[Book] Keepalive on {} (seq {})", symbol, update.seq_id);
            return Ok(Reduction::Ignored);
        }

        // Sequence restart: the venue reset its counter; accept the new
        // baseline rather than treating it as a gap.
        if update.prev_seq_id > update.seq_id {
            warn!(
                "[Book] Sequence restart on {}: prev={} seq={}",
                symbol, update.prev_seq_id, update.seq_id
            );
        } else if state.last_seq > 0 && update.prev_seq_id != state.last_seq {
            return Err(SyncError::OutOfOrder {
                prev: update.prev_seq_id.max(0) as u64,
                last: state.last_seq.max(0) as u64,
            });
        }

        let best_changed = {
            let mut book = state.book.write();
            book.apply_update(&update.bids, &update.asks)
        };
        if let Some(wire) = update.checksum {
            self.verify_checksum(symbol, &state.book.read(), wire)?;
        }
        state.last_seq = update.seq_id;
        state.best_changed = best_changed;
        state.last_ts = update.ts;
        Ok(Reduction::Applied)
    }

    fn on_synchronized(&self, symbol: &String, state: &SyncedBook) {
        let book = state.book.read();
        self.sink.on_depth(DepthSnapshot {
            symbol: symbol.clone(),
            bids: book.bids(),
            asks: book.asks(),
            timestamp_ms: state.last_ts,
        });
        if state.best_changed {
            if let (Some((bid_px, bid_sz)), Some((ask_px, ask_sz))) =
                (book.best_bid(), book.best_ask())
            {
                self.sink.on_quote(QuoteTick {
                    symbol: symbol.clone(),
                    bid_price: bid_px,
                    bid_size: bid_sz,
                    ask_price: ask_px,
                    ask_size: ask_sz,
                    timestamp_ms: state.last_ts,
                });
            }
        }
    }

    fn on_error(&self, symbol: &String, err: &SyncError) {
        warn!("[Book] Resynchronizing {}: {}", symbol, err);
    }
}
