//! Shared candle cache fed by the kline stream.
//!
//! One writer (the stream task) and any number of readers. Every update
//! swaps in a fresh `Arc<HashMap>` so a reader always sees a complete map.

use crate::exchange::Kline;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What the cache knows about one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolCandles {
    /// Close of the latest event, open or closed
    pub last_price: Option<Decimal>,
    /// Most recent closed candle
    pub latest_closed: Option<Kline>,
}

type CandleMap = HashMap<String, SymbolCandles>;

/// Copy-on-write map from symbol to candle state.
#[derive(Debug, Clone, Default)]
pub struct CandleCache {
    inner: Arc<RwLock<Arc<CandleMap>>>,
}

impl CandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one kline event.
    ///
    /// Open candles only move `last_price`; a closed candle becomes the
    /// scoring candle. Replays of an older or identical closed candle are
    /// ignored.
    pub async fn apply(&self, symbol: &str, kline: Kline, closed: bool) {
        let mut guard = self.inner.write().await;
        let mut next: CandleMap = (**guard).clone();
        let entry = next.entry(symbol.to_string()).or_default();

        entry.last_price = Some(kline.close);

        if closed {
            let is_new = entry
                .latest_closed
                .as_ref()
                .map_or(true, |latest| kline.open_time > latest.open_time);
            if is_new {
                entry.latest_closed = Some(kline);
            }
        }

        *guard = Arc::new(next);
    }

    /// Consistent view of every symbol.
    pub async fn snapshot(&self) -> Arc<CandleMap> {
        self.inner.read().await.clone()
    }
}
