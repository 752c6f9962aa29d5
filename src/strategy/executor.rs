//! Order sizing, submission and fill classification.

use super::sizing::{qty_from_balance, qty_from_capital, Infeasible};
use crate::config::{ExecutionConfig, MarginConfig};
use crate::exchange::{
    AccountKind, ApiError, Exchange, MarketOrder, OrderResponse, OrderSide, OrderStatus,
    SideEffectType, SymbolFilters,
};
use crate::utils::decimal::{pct_to_fraction, safe_div, weighted_average};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Where an outcome's average price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPriceSource {
    /// Derived from the exchange's fill report
    Reported,
    /// Fill report missing; pre-trade price used instead
    Approximated,
}

/// Classified result of a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled {
        executed_qty: Decimal,
        avg_price: Decimal,
        price_source: FillPriceSource,
    },
    PartiallyFilled {
        requested_qty: Decimal,
        executed_qty: Decimal,
        avg_price: Decimal,
        price_source: FillPriceSource,
    },
    Rejected {
        reason: String,
    },
    /// The order may or may not have executed.
    Unknown {
        reason: String,
    },
}

impl OrderOutcome {
    /// Executed quantity and average price, if anything executed.
    pub fn fill(&self) -> Option<(Decimal, Decimal)> {
        match self {
            OrderOutcome::Filled {
                executed_qty,
                avg_price,
                ..
            }
            | OrderOutcome::PartiallyFilled {
                executed_qty,
                avg_price,
                ..
            } => Some((*executed_qty, *avg_price)),
            _ => None,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderOutcome::Filled { .. })
    }
}

/// What happened when the executor was asked to trade.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// No valid quantity; nothing was sent.
    Skipped(Infeasible),
    Submitted(OrderOutcome),
}

impl ExecutionResult {
    pub fn outcome(&self) -> Option<&OrderOutcome> {
        match self {
            ExecutionResult::Skipped(_) => None,
            ExecutionResult::Submitted(outcome) => Some(outcome),
        }
    }
}

/// Sizes and submits market orders one at a time.
pub struct OrderExecutor {
    exchange: Arc<dyn Exchange>,
    config: ExecutionConfig,
    margin: MarginConfig,
    capital_fraction: Decimal,
    refresh_filters: bool,
    filters: RwLock<HashMap<String, SymbolFilters>>,
}

impl OrderExecutor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        config: ExecutionConfig,
        margin: MarginConfig,
        capital_fraction: Decimal,
        refresh_filters: bool,
    ) -> Self {
        Self {
            exchange,
            config,
            margin,
            capital_fraction,
            refresh_filters,
            filters: RwLock::new(HashMap::new()),
        }
    }

    /// Account that orders and balances go through.
    pub fn account(&self) -> AccountKind {
        if self.margin.enabled {
            AccountKind::CrossMargin
        } else {
            AccountKind::Spot
        }
    }

    /// Drop cached filters when configured to refetch every cycle.
    pub async fn begin_cycle(&self) {
        if self.refresh_filters {
            self.filters.write().await.clear();
        }
    }

    /// Exchange filters for `symbol`, fetched once and cached.
    pub async fn filters(&self, symbol: &str) -> Result<SymbolFilters> {
        if let Some(cached) = self.filters.read().await.get(symbol) {
            return Ok(*cached);
        }

        let fetched = self
            .exchange
            .symbol_filters(symbol)
            .await
            .with_context(|| format!("Failed to load filters for {}", symbol))?;
        self.filters.write().await.insert(symbol.to_string(), fetched);
        Ok(fetched)
    }

    /// Spend `capital_fraction` of `quote_balance` on `symbol`.
    pub async fn buy(
        &self,
        symbol: &str,
        quote_balance: Decimal,
        price: Decimal,
    ) -> Result<ExecutionResult> {
        let filters = self.filters(symbol).await?;
        let leverage = Decimal::from(self.margin.leverage.max(1));
        let capital = quote_balance * self.capital_fraction * leverage;

        let quantity = match qty_from_capital(capital, price, &filters) {
            Ok(q) => q,
            Err(reason) => {
                warn!(%symbol, %capital, %price, %reason, "⚠️  [ORDER] Buy skipped");
                return Ok(ExecutionResult::Skipped(reason));
            }
        };

        let side_effect = self.margin.enabled.then_some(SideEffectType::MarginBuy);
        Ok(ExecutionResult::Submitted(
            self.submit(symbol, OrderSide::Buy, quantity, price, side_effect).await,
        ))
    }

    /// Sell `base_balance` of `symbol` back to quote.
    pub async fn sell(
        &self,
        symbol: &str,
        base_balance: Decimal,
        price: Decimal,
    ) -> Result<ExecutionResult> {
        let filters = self.filters(symbol).await?;

        let quantity = match qty_from_balance(base_balance, price, &filters) {
            Ok(q) => q,
            Err(reason) => {
                warn!(
                    %symbol,
                    balance = %base_balance,
                    %price,
                    %reason,
                    "⚠️  [ORDER] Sell skipped"
                );
                return Ok(ExecutionResult::Skipped(reason));
            }
        };

        let side_effect = self.margin.enabled.then_some(SideEffectType::AutoRepay);
        Ok(ExecutionResult::Submitted(
            self.submit(symbol, OrderSide::Sell, quantity, price, side_effect).await,
        ))
    }

    async fn submit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        side_effect: Option<SideEffectType>,
    ) -> OrderOutcome {
        let order = MarketOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
            account: self.account(),
            side_effect,
        };

        info!(
            %symbol,
            side = side.as_str(),
            %quantity,
            %price,
            account = ?order.account,
            "📤 [ORDER] Submitting market order"
        );

        let outcome = match self.exchange.market_order(&order).await {
            Ok(response) => classify(&response, quantity, price, self.config.fill_tolerance_pct),
            Err(e) => match e.downcast_ref::<ApiError>() {
                Some(api) if !api.is_server_error() => OrderOutcome::Rejected {
                    reason: api.to_string(),
                },
                _ => OrderOutcome::Unknown {
                    reason: format!("{:#}", e),
                },
            },
        };

        match &outcome {
            OrderOutcome::Filled {
                executed_qty,
                avg_price,
                price_source,
            } => {
                info!(
                    %symbol,
                    side = side.as_str(),
                    %executed_qty,
                    %avg_price,
                    ?price_source,
                    "✅ [ORDER] Filled"
                );
                if *price_source == FillPriceSource::Approximated {
                    warn!(
                        %symbol,
                        %avg_price,
                        "⚠️  [ORDER] No fill report, average price approximated"
                    );
                }
            }
            OrderOutcome::PartiallyFilled {
                requested_qty,
                executed_qty,
                avg_price,
                ..
            } => {
                warn!(
                    %symbol,
                    side = side.as_str(),
                    %requested_qty,
                    %executed_qty,
                    %avg_price,
                    "⚠️  [ORDER] Partially filled"
                );
            }
            OrderOutcome::Rejected { reason } => {
                warn!(%symbol, side = side.as_str(), %reason, "❌ [ORDER] Rejected");
            }
            OrderOutcome::Unknown { reason } => {
                error!(%symbol, side = side.as_str(), %reason, "❓ [ORDER] Outcome unknown");
            }
        }

        outcome
    }
}

/// Average price from the fill report, if one is usable.
fn reported_avg_price(response: &OrderResponse) -> Option<Decimal> {
    if !response.fills.is_empty() {
        let weighted: Vec<(Decimal, Decimal)> =
            response.fills.iter().map(|f| (f.price, f.qty)).collect();
        let avg = weighted_average(&weighted);
        if avg > Decimal::ZERO {
            return Some(avg);
        }
    }

    response
        .cumulative_quote_qty
        .map(|quote| safe_div(quote, response.executed_qty))
        .filter(|avg| *avg > Decimal::ZERO)
}

/// Classify an exchange response against the requested quantity.
///
/// `tolerance_pct` is how far short of the request (in percent) still
/// counts as a full fill.
pub fn classify(
    response: &OrderResponse,
    requested_qty: Decimal,
    fallback_price: Decimal,
    tolerance_pct: Decimal,
) -> OrderOutcome {
    let executed_qty = response.executed_qty;

    if executed_qty <= Decimal::ZERO {
        return match response.status {
            OrderStatus::Rejected
            | OrderStatus::Expired
            | OrderStatus::ExpiredInMatch
            | OrderStatus::Canceled => OrderOutcome::Rejected {
                reason: format!(
                    "order {} {:?} with nothing executed",
                    response.order_id, response.status
                ),
            },
            status => OrderOutcome::Unknown {
                reason: format!(
                    "order {} status {:?} with nothing executed",
                    response.order_id, status
                ),
            },
        };
    }

    let (avg_price, price_source) = match reported_avg_price(response) {
        Some(avg) => (avg, FillPriceSource::Reported),
        None => (fallback_price, FillPriceSource::Approximated),
    };

    let tolerance = requested_qty * pct_to_fraction(tolerance_pct);
    let full = response.status == OrderStatus::Filled
        && (executed_qty - requested_qty).abs() <= tolerance;

    if full {
        OrderOutcome::Filled {
            executed_qty,
            avg_price,
            price_source,
        }
    } else {
        OrderOutcome::PartiallyFilled {
            requested_qty,
            executed_qty,
            avg_price,
            price_source,
        }
    }
}
