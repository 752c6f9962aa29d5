//! Venue-agnostic exchange interface.
//!
//! The rotator, executor and snapshot providers only talk to this trait,
//! so the live Binance client, the paper trading client and test mocks are
//! interchangeable.

use super::types::{
    AccountKind, Kline, KlineInterval, MarketOrder, OrderResponse, SymbolFilters, Ticker24h,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Market data, balances and market order placement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Lot size and notional constraints for a symbol.
    async fn symbol_filters(&self, symbol: &str) -> anyhow::Result<SymbolFilters>;

    /// Latest traded price.
    async fn price(&self, symbol: &str) -> anyhow::Result<Decimal>;

    /// Rolling 24h statistics.
    async fn ticker_24h(&self, symbol: &str) -> anyhow::Result<Ticker24h>;

    /// Most recent `limit` klines, oldest first. The last one may still be open.
    async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: u16,
    ) -> anyhow::Result<Vec<Kline>>;

    /// Free (unlocked) balance of an asset; zero when the asset is absent.
    async fn free_balance(&self, asset: &str, account: AccountKind) -> anyhow::Result<Decimal>;

    /// Submit a market order.
    ///
    /// An `Err` carrying [`super::ApiError`] means the exchange rejected the
    /// request; any other error leaves the order's fate unknown.
    async fn market_order(&self, order: &MarketOrder) -> anyhow::Result<OrderResponse>;
}
