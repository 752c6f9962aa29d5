//! Per-pair price and score snapshots.

use super::cache::CandleCache;
use crate::exchange::{Exchange, Kline, KlineInterval};
use crate::utils::decimal::pct_change;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Lookback used to score a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScoreWindow {
    /// 24h rolling ticker change
    Rolling24h,
    /// Open-to-close change of the last closed candle
    Candle(KlineInterval),
}

impl ScoreWindow {
    pub fn interval(&self) -> Option<KlineInterval> {
        match self {
            ScoreWindow::Rolling24h => None,
            ScoreWindow::Candle(interval) => Some(*interval),
        }
    }
}

impl FromStr for ScoreWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "24h" | "24hr" => Ok(ScoreWindow::Rolling24h),
            other => Ok(ScoreWindow::Candle(other.parse()?)),
        }
    }
}

impl TryFrom<String> for ScoreWindow {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ScoreWindow> for String {
    fn from(window: ScoreWindow) -> Self {
        window.to_string()
    }
}

impl fmt::Display for ScoreWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreWindow::Rolling24h => f.write_str("24h"),
            ScoreWindow::Candle(interval) => f.write_str(interval.as_str()),
        }
    }
}

/// Current price and lookback change for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub symbol: String,
    pub price: Decimal,
    /// Percentage change over the window (1.5 = +1.5%)
    pub change_pct: Decimal,
}

/// Source of snapshots.
///
/// `Ok(None)` means the source has no closed interval for the pair yet.
/// That is distinct from a flat 0% change.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self, symbol: &str) -> Result<Option<Snapshot>>;
}

/// Change between open and close of the latest candle closed at `now_ms`.
pub fn last_closed_change(klines: &[Kline], now_ms: i64) -> Option<(Decimal, Decimal)> {
    let closed = klines.iter().rev().find(|k| k.is_closed_at(now_ms))?;
    let change = pct_change(closed.open, closed.close)?;
    let price = klines.last().map(|k| k.close).unwrap_or(closed.close);
    Some((price, change))
}

/// Polls the exchange REST API every time a snapshot is requested.
pub struct RestSnapshotProvider {
    exchange: Arc<dyn Exchange>,
    window: ScoreWindow,
}

impl RestSnapshotProvider {
    pub fn new(exchange: Arc<dyn Exchange>, window: ScoreWindow) -> Self {
        Self { exchange, window }
    }
}

#[async_trait]
impl SnapshotProvider for RestSnapshotProvider {
    async fn snapshot(&self, symbol: &str) -> Result<Option<Snapshot>> {
        match self.window {
            ScoreWindow::Rolling24h => {
                let ticker = self.exchange.ticker_24h(symbol).await?;
                Ok(Some(Snapshot {
                    symbol: symbol.to_string(),
                    price: ticker.last_price,
                    change_pct: ticker.price_change_percent,
                }))
            }
            ScoreWindow::Candle(interval) => {
                // Two candles: the in-progress one plus the last closed one.
                let klines = self.exchange.klines(symbol, interval, 2).await?;
                let now_ms = Utc::now().timestamp_millis();
                let Some((price, change_pct)) = last_closed_change(&klines, now_ms) else {
                    debug!(%symbol, %interval, "No closed candle yet");
                    return Ok(None);
                };
                trace!(%symbol, %price, %change_pct, "REST snapshot");
                Ok(Some(Snapshot {
                    symbol: symbol.to_string(),
                    price,
                    change_pct,
                }))
            }
        }
    }
}

/// Reads the stream-fed [`CandleCache`].
///
/// A closed candle older than two intervals means the feed has stalled, so
/// the pair reports no data until fresh candles arrive.
pub struct StreamSnapshotProvider {
    cache: CandleCache,
    interval: KlineInterval,
}

impl StreamSnapshotProvider {
    pub fn new(cache: CandleCache, interval: KlineInterval) -> Self {
        Self { cache, interval }
    }

    fn max_age_ms(&self) -> i64 {
        i64::try_from(self.interval.duration().as_millis())
            .unwrap_or(i64::MAX)
            .saturating_mul(2)
    }
}

#[async_trait]
impl SnapshotProvider for StreamSnapshotProvider {
    async fn snapshot(&self, symbol: &str) -> Result<Option<Snapshot>> {
        let candles = self.cache.snapshot().await;
        let Some(entry) = candles.get(symbol) else {
            return Ok(None);
        };
        let Some(closed) = entry.latest_closed.as_ref() else {
            return Ok(None);
        };

        let age_ms = Utc::now().timestamp_millis() - closed.close_time;
        if age_ms > self.max_age_ms() {
            warn!(
                %symbol,
                interval = %self.interval,
                age_ms,
                "⚠️  [STREAM] Last closed candle is stale"
            );
            return Ok(None);
        }

        let Some(change_pct) = pct_change(closed.open, closed.close) else {
            return Ok(None);
        };

        Ok(Some(Snapshot {
            symbol: symbol.to_string(),
            price: entry.last_price.unwrap_or(closed.close),
            change_pct,
        }))
    }
}
