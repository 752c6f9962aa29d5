//! Paper trading client.
//!
//! Market data is delegated to a real [`Exchange`]; balances and fills are
//! simulated locally at the latest traded price with a flat taker fee.
//! Margin side effects are honoured: `MARGIN_BUY` borrows the quote
//! shortfall and `AUTO_REPAY` pays it back out of sale proceeds.

use super::error::ApiError;
use super::traits::Exchange;
use super::types::*;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated wallet, persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperState {
    pub balances: HashMap<String, Decimal>,
    /// Outstanding cross margin loan in the quote asset
    pub borrowed: Decimal,
    pub total_fees: Decimal,
    pub order_count: u64,
}

/// Paper trading client wrapping a market data source.
pub struct PaperExchange<E> {
    market: E,
    quote_asset: String,
    state: RwLock<PaperState>,
    order_id_counter: AtomicI64,
    /// Taker fee rate as a fraction (0.001 = 0.1%)
    fee_rate: Decimal,
}

impl<E: Exchange> PaperExchange<E> {
    /// Create a paper account holding only `initial_quote` of the quote asset.
    pub fn new(market: E, quote_asset: &str, initial_quote: Decimal) -> Self {
        let mut state = PaperState::default();
        state
            .balances
            .insert(quote_asset.to_string(), initial_quote);

        Self {
            market,
            quote_asset: quote_asset.to_string(),
            state: RwLock::new(state),
            order_id_counter: AtomicI64::new(1),
            fee_rate: dec!(0.001),
        }
    }

    /// Override the simulated taker fee.
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Snapshot of the simulated wallet for persistence.
    pub async fn export_state(&self) -> PaperState {
        self.state.read().await.clone()
    }

    /// Replace the simulated wallet with a persisted one.
    pub async fn restore_state(&self, persisted: PaperState) {
        let count = persisted.order_count as i64;
        *self.state.write().await = persisted;
        self.order_id_counter.store(count + 1, Ordering::SeqCst);
    }

    fn base_asset<'a>(&self, symbol: &'a str) -> Result<&'a str> {
        symbol
            .strip_suffix(self.quote_asset.as_str())
            .filter(|base| !base.is_empty())
            .ok_or_else(|| {
                ApiError {
                    status: 400,
                    code: -1121,
                    msg: format!("Invalid symbol {} for quote {}", symbol, self.quote_asset),
                }
                .into()
            })
    }

    fn insufficient(asset: &str, needed: Decimal, available: Decimal) -> anyhow::Error {
        ApiError {
            status: 400,
            code: ApiError::INSUFFICIENT_BALANCE,
            msg: format!(
                "Account has insufficient balance: need {} {}, have {}",
                needed, asset, available
            ),
        }
        .into()
    }
}

#[async_trait]
impl<E: Exchange> Exchange for PaperExchange<E> {
    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        self.market.symbol_filters(symbol).await
    }

    async fn price(&self, symbol: &str) -> Result<Decimal> {
        self.market.price(symbol).await
    }

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        self.market.ticker_24h(symbol).await
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: u16,
    ) -> Result<Vec<Kline>> {
        self.market.klines(symbol, interval, limit).await
    }

    async fn free_balance(&self, asset: &str, _account: AccountKind) -> Result<Decimal> {
        Ok(self
            .state
            .read()
            .await
            .balances
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn market_order(&self, order: &MarketOrder) -> Result<OrderResponse> {
        let base = self.base_asset(&order.symbol)?.to_string();
        let price = self.market.price(&order.symbol).await?;
        let quantity = order.quantity;
        let notional = quantity * price;
        let fee = notional * self.fee_rate;

        let mut state = self.state.write().await;
        let quote_free = state
            .balances
            .get(&self.quote_asset)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let base_free = state.balances.get(&base).copied().unwrap_or(Decimal::ZERO);

        match order.side {
            OrderSide::Buy => {
                let cost = notional + fee;
                let shortfall = (cost - quote_free).max(Decimal::ZERO);
                if shortfall > Decimal::ZERO {
                    if order.side_effect != Some(SideEffectType::MarginBuy) {
                        return Err(Self::insufficient(&self.quote_asset, cost, quote_free));
                    }
                    state.borrowed += shortfall;
                    info!(
                        asset = %self.quote_asset,
                        amount = %shortfall,
                        outstanding = %state.borrowed,
                        "Paper margin loan"
                    );
                }
                state
                    .balances
                    .insert(self.quote_asset.clone(), quote_free + shortfall - cost);
                state.balances.insert(base.clone(), base_free + quantity);
            }
            OrderSide::Sell => {
                if base_free < quantity {
                    return Err(Self::insufficient(&base, quantity, base_free));
                }
                let proceeds = notional - fee;
                let repaid = if order.side_effect == Some(SideEffectType::AutoRepay) {
                    state.borrowed.min(proceeds)
                } else {
                    Decimal::ZERO
                };
                state.borrowed -= repaid;
                if repaid > Decimal::ZERO {
                    info!(
                        asset = %self.quote_asset,
                        amount = %repaid,
                        outstanding = %state.borrowed,
                        "Paper margin repay"
                    );
                }
                state.balances.insert(base.clone(), base_free - quantity);
                state
                    .balances
                    .insert(self.quote_asset.clone(), quote_free + proceeds - repaid);
            }
        }

        state.total_fees += fee;
        state.order_count += 1;
        let order_id = self.order_id_counter.fetch_add(1, Ordering::SeqCst);

        info!(
            order_id,
            symbol = %order.symbol,
            side = ?order.side,
            quantity = %quantity,
            price = %price,
            fee = %fee,
            "Paper order executed"
        );
        debug!(balances = ?state.balances, "Paper balances");

        Ok(OrderResponse {
            symbol: order.symbol.clone(),
            order_id,
            client_order_id: format!("paper-{}", order_id),
            status: OrderStatus::Filled,
            orig_qty: quantity,
            executed_qty: quantity,
            cumulative_quote_qty: Some(notional),
            fills: vec![OrderFill {
                price,
                qty: quantity,
                commission: Some(fee),
                commission_asset: Some(self.quote_asset.clone()),
            }],
        })
    }
}
