//! Exchange integrations.
//!
//! ## Binance
//! REST connectivity for spot and cross margin:
//! - Market data (exchange filters, prices, 24h tickers, klines)
//! - Account balances
//! - Market orders with full fill reports
//!
//! A kline WebSocket stream feeds the streaming snapshot cache, and
//! [`PaperExchange`] simulates fills against live prices.

mod client;
mod error;
mod paper;
mod traits;
mod types;
mod websocket;

pub use client::BinanceClient;
pub use error::ApiError;
pub use paper::{PaperExchange, PaperState};
#[cfg(test)]
pub use traits::MockExchange;
pub use traits::Exchange;
pub use types::*;
pub use websocket::BinanceKlineStream;
