//! Binance kline stream feeding the shared candle cache.

use super::types::{Kline, KlineInterval};
use crate::market::CandleCache;
use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const SPOT_WS_URL: &str = "wss://stream.binance.com:9443";
const SPOT_TESTNET_WS_URL: &str = "wss://stream.testnet.binance.vision";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Combined-stream envelope: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    data: KlineEvent,
}

#[derive(Debug, Deserialize)]
struct KlineEvent {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: KlinePayload,
}

#[derive(Debug, Deserialize)]
struct KlinePayload {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "o")]
    open: Decimal,
    #[serde(rename = "h")]
    high: Decimal,
    #[serde(rename = "l")]
    low: Decimal,
    #[serde(rename = "c")]
    close: Decimal,
    #[serde(rename = "x")]
    closed: bool,
}

/// A parsed kline update.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineUpdate {
    pub symbol: String,
    pub kline: Kline,
    pub closed: bool,
}

/// Parse one combined-stream text frame.
pub fn parse_kline_message(text: &str) -> Result<KlineUpdate> {
    let envelope: StreamEnvelope =
        serde_json::from_str(text).context("Failed to parse kline stream message")?;
    let event = envelope.data;
    if event.event_type != "kline" {
        return Err(anyhow!("Unexpected stream event type: {}", event.event_type));
    }

    let k = event.kline;
    Ok(KlineUpdate {
        symbol: event.symbol,
        kline: Kline {
            open_time: k.open_time,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            close_time: k.close_time,
        },
        closed: k.closed,
    })
}

/// Binance spot kline stream.
pub struct BinanceKlineStream {
    base_url: String,
}

impl BinanceKlineStream {
    pub fn new(testnet: bool) -> Self {
        let base_url = if testnet {
            SPOT_TESTNET_WS_URL.to_string()
        } else {
            SPOT_WS_URL.to_string()
        };

        Self { base_url }
    }

    /// Combined stream URL for the given symbols.
    pub fn stream_url(&self, symbols: &[String], interval: KlineInterval) -> Result<String> {
        if symbols.is_empty() {
            return Err(anyhow!("Kline stream needs at least one symbol"));
        }
        let streams: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@kline_{}", s.to_lowercase(), interval.as_str()))
            .collect();

        Ok(format!("{}/stream?streams={}", self.base_url, streams.join("/")))
    }

    /// Spawn the stream task. It is the only writer of `cache` and
    /// reconnects until the returned handle is aborted.
    pub fn spawn(
        &self,
        symbols: &[String],
        interval: KlineInterval,
        cache: CandleCache,
    ) -> Result<JoinHandle<()>> {
        let url = self.stream_url(symbols, interval)?;

        Ok(tokio::spawn(async move {
            loop {
                match run_connection(&url, &cache).await {
                    Ok(()) => info!("🔌 [STREAM] Closed by server, reconnecting"),
                    Err(e) => error!("🔌 [STREAM] Connection failed: {:#}", e),
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }))
    }
}

async fn run_connection(url: &str, cache: &CandleCache) -> Result<()> {
    info!("🔌 [STREAM] Connecting to {}", url);

    let (ws_stream, _) = connect_async(url)
        .await
        .context("Failed to connect to WebSocket")?;
    let (mut write, mut read) = ws_stream.split();

    info!("🔌 [STREAM] Connected");

    while let Some(msg) = read.next().await {
        match msg.context("WebSocket read error")? {
            Message::Text(text) => match parse_kline_message(&text) {
                Ok(update) => {
                    if update.closed {
                        debug!(
                            symbol = %update.symbol,
                            open = %update.kline.open,
                            close = %update.kline.close,
                            "Candle closed"
                        );
                    }
                    cache.apply(&update.symbol, update.kline, update.closed).await;
                }
                Err(e) => warn!("Ignoring stream message: {:#}", e),
            },
            Message::Ping(payload) => {
                write
                    .send(Message::Pong(payload))
                    .await
                    .context("Failed to answer ping")?;
            }
            Message::Close(_) => return Ok(()),
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CLOSED_FRAME: &str = r#"{
        "stream": "solusdc@kline_15m",
        "data": {
            "e": "kline", "E": 1700000900001, "s": "SOLUSDC",
            "k": {
                "t": 1700000000000, "T": 1700000899999, "s": "SOLUSDC", "i": "15m",
                "o": "100.00", "c": "101.50", "h": "102.00", "l": "99.80",
                "v": "1234.5", "n": 321, "x": true, "q": "125000.0"
            }
        }
    }"#;

    #[test]
    fn test_parse_closed_kline() {
        let update = parse_kline_message(CLOSED_FRAME).unwrap();

        assert_eq!(update.symbol, "SOLUSDC");
        assert!(update.closed);
        assert_eq!(update.kline.open, dec!(100.00));
        assert_eq!(update.kline.close, dec!(101.50));
        assert_eq!(update.kline.close_time, 1700000899999);
    }

    #[test]
    fn test_parse_rejects_other_events() {
        let frame = r#"{"stream":"solusdc@trade","data":{"e":"trade","s":"SOLUSDC","k":{"t":0,"T":0,"o":"1","h":"1","l":"1","c":"1","x":false}}}"#;
        assert!(parse_kline_message(frame).is_err());
        assert!(parse_kline_message("not json").is_err());
    }

    #[test]
    fn test_stream_url() {
        let stream = BinanceKlineStream::new(false);
        let url = stream
            .stream_url(
                &["SOLUSDC".to_string(), "DOTUSDC".to_string()],
                KlineInterval::Minutes15,
            )
            .unwrap();

        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=solusdc@kline_15m/dotusdc@kline_15m"
        );
        assert!(stream.stream_url(&[], KlineInterval::Minutes1).is_err());
    }

    #[tokio::test]
    async fn test_parsed_update_feeds_cache() {
        let cache = CandleCache::new();
        let update = parse_kline_message(CLOSED_FRAME).unwrap();

        cache.apply(&update.symbol, update.kline, update.closed).await;

        let candles = cache.snapshot().await;
        let closed = candles["SOLUSDC"].latest_closed.as_ref().unwrap();
        assert_eq!(closed.close, dec!(101.50));
    }
}
