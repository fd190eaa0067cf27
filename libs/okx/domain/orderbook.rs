//! Order book domain entities
//!
//! Price-level ladder for one instrument. Levels keep their original wire
//! strings alongside the parsed values because the venue checksum is computed
//! over the exact strings it sent.

use tracing::warn;

// =============================================================================
// Price Level - Basic unit of the book
// =============================================================================

/// One `(price, size)` pair as delivered on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
    pub price: String,
    pub size: String,
}

impl PriceLevel {
    pub fn new(price: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            size: size.into(),
        }
    }

    /// Build from a wire array `["px", "sz", ...]`; trailing elements
    /// (liquidated orders, order counts) are ignored.
    pub fn from_wire(row: &[String]) -> Option<Self> {
        match row {
            [price, size, ..] => Some(Self::new(price.clone(), size.clone())),
            _ => None,
        }
    }

    fn parse(&self) -> Option<(f64, f64)> {
        let price: f64 = self.price.parse().ok()?;
        let size: f64 = self.size.parse().ok()?;
        if !price.is_finite() || !size.is_finite() || price <= 0.0 || size < 0.0 {
            return None;
        }
        Some((price, size))
    }
}

/// A resident level: parsed values plus the wire strings they came from.
#[derive(Debug, Clone)]
struct BookLevel {
    price: f64,
    size: f64,
    px: String,
    sz: String,
}

// =============================================================================
// BookSide - One side of the book (bids or asks)
// =============================================================================

/// A single side of the book.
///
/// Bids sort descending (highest first), asks ascending (lowest first), so
/// the best level is always at index 0.
#[derive(Debug, Clone)]
struct BookSide {
    levels: Vec<BookLevel>,
    is_bid: bool,
    max_depth: Option<usize>,
}

impl BookSide {
    fn new(is_bid: bool, max_depth: Option<usize>) -> Self {
        Self {
            levels: Vec::with_capacity(64),
            is_bid,
            max_depth,
        }
    }

    /// Replace the entire side with snapshot data. Zero-size and malformed
    /// levels are skipped.
    fn apply_snapshot(&mut self, levels: &[PriceLevel]) {
        self.levels.clear();
        self.levels.reserve(levels.len());

        for level in levels {
            let (price, size) = match level.parse() {
                Some(pair) => pair,
                None => {
                    warn!("[Book] skipping malformed level {:?}", level);
                    continue;
                }
            };
            if size > 0.0 {
                self.levels.push(BookLevel {
                    price,
                    size,
                    px: level.price.clone(),
                    sz: level.size.clone(),
                });
            }
        }

        if self.is_bid {
            self.levels
                .sort_unstable_by(|a, b| b.price.total_cmp(&a.price));
        } else {
            self.levels
                .sort_unstable_by(|a, b| a.price.total_cmp(&b.price));
        }

        self.enforce_depth();
    }

    /// Upsert or delete a single price level. `size == 0` deletes.
    ///
    /// Level identity is the wire price string: the venue always replays the
    /// exact price it quoted, so string equality avoids float-comparison
    /// pitfalls entirely.
    fn apply_update(&mut self, level: &PriceLevel) {
        let (price, size) = match level.parse() {
            Some(pair) => pair,
            None => {
                warn!("[Book] skipping malformed level {:?}", level);
                return;
            }
        };

        if size == 0.0 {
            if let Some(idx) = self.levels.iter().position(|l| l.px == level.price) {
                self.levels.remove(idx);
            }
            return;
        }

        // Find insertion point in sort order
        let pos = self.levels.iter().position(|l| {
            if self.is_bid {
                l.price <= price
            } else {
                l.price >= price
            }
        });

        match pos {
            Some(idx) if self.levels[idx].px == level.price => {
                self.levels[idx].size = size;
                self.levels[idx].sz = level.size.clone();
            }
            Some(idx) => {
                self.levels.insert(
                    idx,
                    BookLevel {
                        price,
                        size,
                        px: level.price.clone(),
                        sz: level.size.clone(),
                    },
                );
                self.enforce_depth();
            }
            None => {
                self.levels.push(BookLevel {
                    price,
                    size,
                    px: level.price.clone(),
                    sz: level.size.clone(),
                });
                self.enforce_depth();
            }
        }
    }

    /// Evict the worst levels past the configured depth (lowest bids /
    /// highest asks live at the tail in either sort order).
    fn enforce_depth(&mut self) {
        if let Some(max) = self.max_depth {
            if self.levels.len() > max {
                self.levels.truncate(max);
            }
        }
    }

    #[inline]
    fn best(&self) -> Option<(f64, f64)> {
        self.levels.first().map(|l| (l.price, l.size))
    }

    fn snapshot(&self) -> Vec<(f64, f64)> {
        self.levels.iter().map(|l| (l.price, l.size)).collect()
    }

    fn wire_levels(&self, depth: usize) -> impl Iterator<Item = (&str, &str)> {
        self.levels
            .iter()
            .take(depth)
            .map(|l| (l.px.as_str(), l.sz.as_str()))
    }

    fn len(&self) -> usize {
        self.levels.len()
    }

    fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

// =============================================================================
// OrderBook - Complete book for one instrument
// =============================================================================

/// Complete order book for one instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub inst_id: String,
    bids: BookSide,
    asks: BookSide,
}

impl OrderBook {
    /// Create an empty book. `max_depth` bounds each side; `None` keeps
    /// everything the venue sends.
    pub fn new(inst_id: impl Into<String>, max_depth: Option<usize>) -> Self {
        Self {
            inst_id: inst_id.into(),
            bids: BookSide::new(true, max_depth),
            asks: BookSide::new(false, max_depth),
        }
    }

    /// Atomically replace both sides with a full snapshot.
    ///
    /// Returns whether the best bid or ask changed, evaluated once for the
    /// whole snapshot (never per level).
    pub fn apply_snapshot(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) -> bool {
        let before = (self.bids.best(), self.asks.best());
        self.bids.apply_snapshot(bids);
        self.asks.apply_snapshot(asks);
        before != (self.bids.best(), self.asks.best())
    }

    /// Apply a batch of incremental level changes (`size == 0` deletes).
    ///
    /// Returns whether the best bid or ask changed, evaluated once for the
    /// whole batch.
    pub fn apply_update(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) -> bool {
        let before = (self.bids.best(), self.asks.best());
        for level in bids {
            self.bids.apply_update(level);
        }
        for level in asks {
            self.asks.apply_update(level);
        }
        before != (self.bids.best(), self.asks.best())
    }

    /// Highest bid as `(price, size)`.
    #[inline]
    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids.best()
    }

    /// Lowest ask as `(price, size)`.
    #[inline]
    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks.best()
    }

    /// Point-in-time bid levels, descending. The returned vector does not
    /// reflect later mutations.
    pub fn bids(&self) -> Vec<(f64, f64)> {
        self.bids.snapshot()
    }

    /// Point-in-time ask levels, ascending.
    pub fn asks(&self) -> Vec<(f64, f64)> {
        self.asks.snapshot()
    }

    /// Top-of-book wire strings for checksum computation:
    /// `(bid_px, bid_sz)` and `(ask_px, ask_sz)` pairs, best first.
    pub fn wire_top(&self, depth: usize) -> (Vec<(&str, &str)>, Vec<(&str, &str)>) {
        (
            self.bids.wire_levels(depth).collect(),
            self.asks.wire_levels(depth).collect(),
        )
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Format top of book for logging.
    pub fn format_summary(&self) -> String {
        let bid = self
            .best_bid()
            .map(|(p, s)| format!("{} ({})", p, s))
            .unwrap_or_else(|| "N/A".to_string());
        let ask = self
            .best_ask()
            .map(|(p, s)| format!("{} ({})", p, s))
            .unwrap_or_else(|| "N/A".to_string());
        format!("Bid: {} | Ask: {}", bid, ask)
    }
}

// =============================================================================
// Tests
// =============================================================================
