//! Watches live order books for a set of instruments and prints top-of-book
//! moves. Runs against public market data only; no credentials needed.
//!
//! ```text
//! RUST_LOG=info cargo run --bin depth_watch -- BTC-USDT ETH-USDT
//! ```

use std::sync::Arc;

use okx::adapter::OkxAdapter;
use okx::domain::tick::{DepthSnapshot, QuoteTick, TradeTick};
use okx::infrastructure::config::OkxConfig;
use okx::ports::{NoOpOrderNotifier, StaticSymbolMapper, TickSink};
use tracing::info;

struct PrintSink;

impl TickSink for PrintSink {
    fn on_quote(&self, quote: QuoteTick) {
        info!(
            "{}  bid {} x {}  |  ask {} x {}",
            quote.symbol, quote.bid_price, quote.bid_size, quote.ask_price, quote.ask_size
        );
    }

    fn on_trade(&self, trade: TradeTick) {
        info!(
            "{}  trade {} @ {} ({})",
            trade.symbol, trade.size, trade.price, trade.aggressor
        );
    }

    fn on_depth(&self, _: DepthSnapshot) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let inst_ids: Vec<String> = std::env::args().skip(1).collect();
    let inst_ids = if inst_ids.is_empty() {
        vec!["BTC-USDT".to_string()]
    } else {
        inst_ids
    };

    // Venue instrument ids double as internal symbols here.
    let pairs: Vec<(&str, &str)> = inst_ids
        .iter()
        .map(|id| (id.as_str(), id.as_str()))
        .collect();
    let mapper = Arc::new(StaticSymbolMapper::new(&pairs));

    let adapter = OkxAdapter::new(
        OkxConfig::public(),
        mapper,
        Arc::new(PrintSink),
        Arc::new(NoOpOrderNotifier),
    );

    adapter.connect().await?;

    match adapter.live_instruments("SPOT").await {
        Ok(live) => {
            for inst_id in &inst_ids {
                if !live.contains(inst_id) {
                    tracing::warn!("{} is not a live SPOT instrument", inst_id);
                }
            }
        }
        Err(e) => tracing::warn!("Instrument catalog unavailable: {}", e),
    }

    for inst_id in &inst_ids {
        adapter.subscribe(inst_id)?;
        adapter.backfill_trades(inst_id, 100).await?;
        info!("Watching {}", inst_id);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    adapter.shutdown();
    Ok(())
}
