//! Type definitions for Binance spot and cross margin API responses.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Exchange information for spot symbols.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    pub symbols: Vec<SpotSymbolInfo>,
}

/// Spot symbol information from exchange info.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// The subset of exchange filters that constrain market order size.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolFilter {
    #[serde(rename_all = "camelCase")]
    LotSize {
        #[serde(with = "rust_decimal::serde::str")]
        min_qty: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        step_size: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    MinNotional {
        #[serde(with = "rust_decimal::serde::str")]
        min_notional: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    Notional {
        #[serde(with = "rust_decimal::serde::str")]
        min_notional: Decimal,
    },
    #[serde(other)]
    Other,
}

/// Per-pair order size constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Minimum order quantity in base units
    pub min_qty: Decimal,
    /// Quantity granularity
    pub step_size: Decimal,
    /// Minimum order value (price * quantity) in quote units
    pub min_notional: Decimal,
}

impl SpotSymbolInfo {
    /// Collapse the raw filter list into [`SymbolFilters`].
    ///
    /// A missing LOT_SIZE filter is an error; a missing notional filter
    /// means no notional floor.
    pub fn symbol_filters(&self) -> Result<SymbolFilters> {
        let (min_qty, step_size) = self
            .filters
            .iter()
            .find_map(|f| match f {
                SymbolFilter::LotSize { min_qty, step_size } => Some((*min_qty, *step_size)),
                _ => None,
            })
            .ok_or_else(|| anyhow!("No LOT_SIZE filter for {}", self.symbol))?;

        let min_notional = self
            .filters
            .iter()
            .find_map(|f| match f {
                SymbolFilter::MinNotional { min_notional }
                | SymbolFilter::Notional { min_notional } => Some(*min_notional),
                _ => None,
            })
            .unwrap_or(Decimal::ZERO);

        Ok(SymbolFilters {
            min_qty,
            step_size,
            min_notional,
        })
    }
}

/// Latest price for a symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// 24-hour rolling ticker statistics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_change_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub last_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub open_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub quote_volume: Decimal,
}

/// Kline / candlestick interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KlineInterval {
    Minutes1,
    Minutes3,
    Minutes5,
    Minutes15,
    Minutes30,
    Hours1,
    Hours2,
    Hours4,
    Hours6,
    Hours8,
    Hours12,
    Days1,
}

impl KlineInterval {
    /// Binance interval code (e.g. "15m").
    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::Minutes1 => "1m",
            KlineInterval::Minutes3 => "3m",
            KlineInterval::Minutes5 => "5m",
            KlineInterval::Minutes15 => "15m",
            KlineInterval::Minutes30 => "30m",
            KlineInterval::Hours1 => "1h",
            KlineInterval::Hours2 => "2h",
            KlineInterval::Hours4 => "4h",
            KlineInterval::Hours6 => "6h",
            KlineInterval::Hours8 => "8h",
            KlineInterval::Hours12 => "12h",
            KlineInterval::Days1 => "1d",
        }
    }

    pub fn duration(&self) -> Duration {
        let minutes = match self {
            KlineInterval::Minutes1 => 1,
            KlineInterval::Minutes3 => 3,
            KlineInterval::Minutes5 => 5,
            KlineInterval::Minutes15 => 15,
            KlineInterval::Minutes30 => 30,
            KlineInterval::Hours1 => 60,
            KlineInterval::Hours2 => 120,
            KlineInterval::Hours4 => 240,
            KlineInterval::Hours6 => 360,
            KlineInterval::Hours8 => 480,
            KlineInterval::Hours12 => 720,
            KlineInterval::Days1 => 1440,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl FromStr for KlineInterval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let interval = match s.trim() {
            "1m" => KlineInterval::Minutes1,
            "3m" => KlineInterval::Minutes3,
            "5m" => KlineInterval::Minutes5,
            "15m" => KlineInterval::Minutes15,
            "30m" => KlineInterval::Minutes30,
            "1h" => KlineInterval::Hours1,
            "2h" => KlineInterval::Hours2,
            "4h" => KlineInterval::Hours4,
            "6h" => KlineInterval::Hours6,
            "8h" => KlineInterval::Hours8,
            "12h" => KlineInterval::Hours12,
            "1d" => KlineInterval::Days1,
            other => return Err(anyhow!("Unsupported kline interval: {}", other)),
        };
        Ok(interval)
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single candlestick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub close_time: i64,
}

impl Kline {
    /// Parse one row of the `/api/v3/klines` array-of-arrays response.
    pub fn from_row(row: &[serde_json::Value]) -> Result<Self> {
        fn decimal_at(row: &[serde_json::Value], idx: usize) -> Result<Decimal> {
            let raw = row
                .get(idx)
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("Kline field {} missing or not a string", idx))?;
            Decimal::from_str(raw).with_context(|| format!("Invalid decimal in kline: {}", raw))
        }

        fn int_at(row: &[serde_json::Value], idx: usize) -> Result<i64> {
            row.get(idx)
                .and_then(|v| v.as_i64())
                .ok_or_else(|| anyhow!("Kline field {} missing or not an integer", idx))
        }

        Ok(Self {
            open_time: int_at(row, 0)?,
            open: decimal_at(row, 1)?,
            high: decimal_at(row, 2)?,
            low: decimal_at(row, 3)?,
            close: decimal_at(row, 4)?,
            close_time: int_at(row, 6)?,
        })
    }

    /// Whether the candle had closed at `now_ms`.
    pub fn is_closed_at(&self, now_ms: i64) -> bool {
        self.close_time < now_ms
    }
}

/// Spot account balance entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// Spot account information.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotAccount {
    pub balances: Vec<SpotBalance>,
}

/// Cross margin account details.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossMarginAccount {
    pub user_assets: Vec<MarginAccountAsset>,
}

/// Asset balance in margin account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAccountAsset {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub borrowed: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub net_asset: Decimal,
}

/// Which wallet an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Spot,
    CrossMargin,
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    ExpiredInMatch,
}

/// Side effect type for margin orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SideEffectType {
    /// Borrow to execute the trade
    MarginBuy,
    /// Repay debt with trade proceeds
    AutoRepay,
}

/// Market order request, spot or cross margin.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: OrderSide,
    /// Base asset quantity, already quantized to the lot size
    pub quantity: Decimal,
    pub account: AccountKind,
    /// Only sent for margin orders
    pub side_effect: Option<SideEffectType>,
}

/// One execution of a market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFill {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub commission_asset: Option<String>,
}

/// Order response (`newOrderRespType=FULL`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub orig_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    #[serde(
        rename = "cummulativeQuoteQty",
        default,
        with = "rust_decimal::serde::str_option"
    )]
    pub cumulative_quote_qty: Option<Decimal>,
    #[serde(default)]
    pub fills: Vec<OrderFill>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_filters_from_exchange_info() {
        let json = r#"{
            "symbols": [{
                "symbol": "SOLUSDC",
                "status": "TRADING",
                "baseAsset": "SOL",
                "quoteAsset": "USDC",
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "10000", "tickSize": "0.01"},
                    {"filterType": "LOT_SIZE", "minQty": "0.00100000", "maxQty": "9000.0", "stepSize": "0.00100000"},
                    {"filterType": "NOTIONAL", "minNotional": "5.00000000", "applyMinToMarket": true}
                ]
            }]
        }"#;

        let info: ExchangeInfo = serde_json::from_str(json).unwrap();
        let filters = info.symbols[0].symbol_filters().unwrap();

        assert_eq!(filters.min_qty, dec!(0.001));
        assert_eq!(filters.step_size, dec!(0.001));
        assert_eq!(filters.min_notional, dec!(5));
    }

    #[test]
    fn test_missing_notional_filter_defaults_to_zero() {
        let json = r#"{
            "symbol": "DOTUSDC",
            "status": "TRADING",
            "baseAsset": "DOT",
            "quoteAsset": "USDC",
            "filters": [
                {"filterType": "LOT_SIZE", "minQty": "0.01", "maxQty": "90000", "stepSize": "0.01"}
            ]
        }"#;

        let info: SpotSymbolInfo = serde_json::from_str(json).unwrap();
        let filters = info.symbol_filters().unwrap();
        assert_eq!(filters.min_notional, Decimal::ZERO);
    }

    #[test]
    fn test_missing_lot_size_is_error() {
        let info = SpotSymbolInfo {
            symbol: "DOTUSDC".to_string(),
            status: "TRADING".to_string(),
            base_asset: "DOT".to_string(),
            quote_asset: "USDC".to_string(),
            filters: vec![],
        };
        assert!(info.symbol_filters().is_err());
    }

    #[test]
    fn test_kline_from_row() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            r#"[1700000000000, "100.0", "101.5", "99.5", "101.0", "1234.5",
                1700000899999, "124000.0", 310, "600.0", "60000.0", "0"]"#,
        )
        .unwrap();

        let kline = Kline::from_row(&row).unwrap();
        assert_eq!(kline.open, dec!(100.0));
        assert_eq!(kline.close, dec!(101.0));
        assert_eq!(kline.close_time, 1700000899999);
        assert!(kline.is_closed_at(1700000900000));
        assert!(!kline.is_closed_at(1700000899999));
    }

    #[test]
    fn test_order_response_with_fills() {
        let json = r#"{
            "symbol": "SOLUSDC",
            "orderId": 28,
            "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1507725176595,
            "price": "0.00000000",
            "origQty": "2.000",
            "executedQty": "2.000",
            "cummulativeQuoteQty": "201.00",
            "status": "FILLED",
            "type": "MARKET",
            "side": "BUY",
            "fills": [
                {"price": "100.00", "qty": "1.000", "commission": "0.001", "commissionAsset": "SOL"},
                {"price": "101.00", "qty": "1.000", "commission": "0.001", "commissionAsset": "SOL"}
            ]
        }"#;

        let resp: OrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, OrderStatus::Filled);
        assert_eq!(resp.executed_qty, dec!(2));
        assert_eq!(resp.cumulative_quote_qty, Some(dec!(201)));
        assert_eq!(resp.fills.len(), 2);
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!("15m".parse::<KlineInterval>().unwrap(), KlineInterval::Minutes15);
        assert_eq!(KlineInterval::Hours1.duration(), Duration::from_secs(3600));
        assert!("24h".parse::<KlineInterval>().is_err());
    }
}
