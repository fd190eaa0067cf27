//! Order-book checksum validation
//!
//! OKX delivers a CRC32 checksum with depth pushes, computed over the top 25
//! levels of each side interleaved as `bid_px:bid_sz:ask_px:ask_sz:...`,
//! using the exact price/size strings from the wire. Recomputing it locally
//! detects silent corruption independently of sequence numbers.

use crate::domain::orderbook::OrderBook;

/// Number of levels per side the venue includes in its checksum.
pub const CHECKSUM_DEPTH: usize = 25;

/// Result of a checksum comparison; `calculated` is kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumOutcome {
    pub ok: bool,
    pub calculated: i32,
}

/// Build the checksum payload: bid/ask levels interleaved best-first, each
/// level contributing `px:sz`, fields joined by `:`. When one side runs out
/// of levels the remainder of the other side is appended.
fn payload(book: &OrderBook, depth: usize) -> String {
    let (bids, asks) = book.wire_top(depth);
    let mut fields: Vec<&str> = Vec::with_capacity(4 * depth);

    let mut bid_iter = bids.iter();
    let mut ask_iter = asks.iter();
    loop {
        match (bid_iter.next(), ask_iter.next()) {
            (None, None) => break,
            (bid, ask) => {
                if let Some((px, sz)) = bid {
                    fields.push(px);
                    fields.push(sz);
                }
                if let Some((px, sz)) = ask {
                    fields.push(px);
                    fields.push(sz);
                }
            }
        }
    }

    fields.join(":")
}

/// Recompute the checksum over the top `depth` levels of `book`.
///
/// The venue transmits the value as a signed 32-bit integer, so the CRC32 is
/// reinterpreted as `i32` for comparison.
pub fn compute(book: &OrderBook, depth: usize) -> i32 {
    crc32fast::hash(payload(book, depth).as_bytes()) as i32
}

/// Compare the wire checksum against the locally computed value.
///
/// A mismatch is a corruption signal for the caller to act on (log, or force
/// a resync in strict mode); validation itself never halts data flow.
pub fn validate(book: &OrderBook, wire: i32, depth: usize) -> ChecksumOutcome {
    let calculated = compute(book, depth);
    ChecksumOutcome {
        ok: calculated == wire,
        calculated,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orderbook::PriceLevel;

    fn book_with(bids: &[(&str, &str)], asks: &[(&str, &str)]) -> OrderBook {
        let mut book = OrderBook::new("BTC-USDT", None);
        let bids: Vec<PriceLevel> = bids
            .iter()
            .map(|(p, s)| PriceLevel::new(*p, *s))
            .collect();
        let asks: Vec<PriceLevel> = asks
            .iter()
            .map(|(p, s)| PriceLevel::new(*p, *s))
            .collect();
        book.apply_snapshot(&bids, &asks);
        book
    }

    #[test]
    fn test_payload_interleaves_bid_ask() {
        let book = book_with(
            &[("3366.1", "7"), ("3366", "6")],
            &[("3366.8", "9"), ("3368", "8")],
        );
        assert_eq!(
            payload(&book, CHECKSUM_DEPTH),
            "3366.1:7:3366.8:9:3366:6:3368:8"
        );
    }

    #[test]
    fn test_payload_appends_leftover_side() {
        let book = book_with(&[("3366.1", "7")], &[("3366.8", "9"), ("3368", "8")]);
        assert_eq!(payload(&book, CHECKSUM_DEPTH), "3366.1:7:3366.8:9:3368:8");

        let book = book_with(&[("3366.1", "7"), ("3366", "6")], &[]);
        assert_eq!(payload(&book, CHECKSUM_DEPTH), "3366.1:7:3366:6");
    }

    #[test]
    fn test_validate_against_known_crc() {
        let book = book_with(
            &[("3366.1", "7"), ("3366", "6")],
            &[("3366.8", "9"), ("3368", "8")],
        );
        let expected = crc32fast::hash(b"3366.1:7:3366.8:9:3366:6:3368:8") as i32;

        let outcome = validate(&book, expected, CHECKSUM_DEPTH);
        assert!(outcome.ok);
        assert_eq!(outcome.calculated, expected);
    }

    #[test]
    fn test_validate_detects_mismatch() {
        let book = book_with(&[("100", "1")], &[("101", "1")]);
        let outcome = validate(&book, 12345, CHECKSUM_DEPTH);
        assert!(!outcome.ok);
        assert_ne!(outcome.calculated, 12345);
    }

    #[test]
    fn test_depth_limits_payload() {
        // With depth 1, deeper levels never enter the payload.
        let book = book_with(
            &[("100", "1"), ("99", "1")],
            &[("101", "1"), ("102", "1")],
        );
        assert_eq!(payload(&book, 1), "100:1:101:1");
    }
}
