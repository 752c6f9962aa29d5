//! Single-position rotator.
//!
//! Owns the current [`Position`] and runs one cycle at a time:
//! collect snapshots, decide, then sell before buying. The position only
//! changes when the exchange reports executed quantity. An order with an
//! unknown outcome is settled by re-reading balances before the next
//! decision.

use super::executor::{OrderExecutor, OrderOutcome};
use super::rotation::{decide, Decision, MarketView, Position};
use super::scoring::SymbolScore;
use super::sizing::qty_from_balance;
use crate::config::{Config, LimitsConfig, RotationConfig, RotationMode};
use crate::exchange::Exchange;
use crate::market::SnapshotProvider;
use crate::persistence::{BotState, JsonFile};
use crate::risk::DailyLimits;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub decision: Decision,
    /// Position after the cycle
    pub position: Position,
    /// Candidates that had data this cycle
    pub scored: usize,
    pub equity: Decimal,
}

pub struct Rotator {
    exchange: Arc<dyn Exchange>,
    snapshots: Box<dyn SnapshotProvider>,
    executor: OrderExecutor,
    config: RotationConfig,
    limits_config: LimitsConfig,
    store: Option<JsonFile<BotState>>,
    state: BotState,
    position: Position,
    limits: DailyLimits,
}

impl Rotator {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        snapshots: Box<dyn SnapshotProvider>,
        config: &Config,
        store: Option<JsonFile<BotState>>,
    ) -> Self {
        let executor = OrderExecutor::new(
            exchange.clone(),
            config.execution.clone(),
            config.margin.clone(),
            config.rotation.capital_fraction,
            config.market.refresh_filters_every_cycle,
        );

        Self {
            exchange,
            snapshots,
            executor,
            config: config.rotation.clone(),
            limits_config: config.limits.clone(),
            store,
            state: BotState::default(),
            position: Position::HoldingQuote,
            limits: DailyLimits::new(&config.limits, Utc::now().date_naive()),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    /// Restore persisted state and work out what is currently held.
    pub async fn initialize(&mut self) -> Result<()> {
        if let Some(store) = &self.store {
            self.state = store.load()?;
        }

        let today = Utc::now().date_naive();
        self.limits = DailyLimits::restore(
            &self.limits_config,
            self.state.trading_day.unwrap_or(today),
            self.state.trades_today,
            self.state.losses_today,
            today,
        );

        self.position = match self.restore_position().await? {
            Some(position) => position,
            None => self.detect_position().await?,
        };
        self.reconcile().await?;

        info!(position = %self.position, "🔎 [INIT] Starting position");
        self.persist();
        Ok(())
    }

    /// Settle an order whose outcome was never confirmed.
    ///
    /// The position is re-detected from balances. A held pair that is
    /// still held keeps its known entry price.
    async fn reconcile(&mut self) -> Result<()> {
        let Some(symbol) = self.state.unsettled_order.clone() else {
            return Ok(());
        };

        let detected = self.detect_position().await?;
        let position = match (&self.position, detected) {
            (
                Position::HoldingAlt {
                    symbol: held,
                    entry_price,
                },
                Position::HoldingAlt { symbol: found, .. },
            ) if *held == found => Position::HoldingAlt {
                symbol: found,
                entry_price: *entry_price,
            },
            (_, detected) => detected,
        };

        warn!(
            %symbol,
            before = %self.position,
            after = %position,
            "🔎 [RECONCILE] Position re-read after unconfirmed order"
        );
        self.position = position;
        self.state.unsettled_order = None;
        self.persist();
        Ok(())
    }

    fn mark_unsettled(&mut self, symbol: &str) {
        self.state.unsettled_order = Some(symbol.to_string());
        self.persist();
    }

    /// Persisted holding, if it is configured and still backed by a balance.
    async fn restore_position(&self) -> Result<Option<Position>> {
        let (Some(symbol), Some(entry_price)) = (&self.state.holding, self.state.entry_price) else {
            return Ok(None);
        };

        if !self.config.symbols.contains(symbol) {
            warn!(%symbol, "⚠️  [INIT] Persisted holding is not a configured pair, ignoring");
            return Ok(None);
        }

        match self.sellable_value(symbol).await? {
            Some(_) => {
                info!(%symbol, %entry_price, "📂 [INIT] Restored holding from state file");
                Ok(Some(Position::HoldingAlt {
                    symbol: symbol.clone(),
                    entry_price,
                }))
            }
            None => {
                warn!(%symbol, "⚠️  [INIT] Persisted holding has no sellable balance, rescanning");
                Ok(None)
            }
        }
    }

    /// Largest sellable alt balance among configured pairs, priced now.
    async fn detect_position(&self) -> Result<Position> {
        let mut best: Option<(String, Decimal, Decimal)> = None;

        for symbol in &self.config.symbols {
            let Some((value, price)) = self.sellable_value(symbol).await? else {
                continue;
            };
            debug!(%symbol, %value, "Found alt balance");
            if best.as_ref().map_or(true, |(_, v, _)| value > *v) {
                best = Some((symbol.clone(), value, price));
            }
        }

        Ok(match best {
            Some((symbol, value, price)) => {
                info!(
                    %symbol,
                    %value,
                    entry_price = %price,
                    "🔎 [INIT] Detected existing alt position"
                );
                Position::HoldingAlt {
                    symbol,
                    entry_price: price,
                }
            }
            None => Position::HoldingQuote,
        })
    }

    /// Quote value and price of the free balance of `symbol`'s base asset,
    /// when that balance could be sold.
    async fn sellable_value(&self, symbol: &str) -> Result<Option<(Decimal, Decimal)>> {
        let balance = self.base_balance(symbol).await?;
        if balance <= Decimal::ZERO {
            return Ok(None);
        }

        let price = self
            .exchange
            .price(symbol)
            .await
            .with_context(|| format!("Failed to price {}", symbol))?;
        let filters = self.executor.filters(symbol).await?;

        Ok(qty_from_balance(balance, price, &filters)
            .ok()
            .map(|_| (balance * price, price)))
    }

    async fn base_balance(&self, symbol: &str) -> Result<Decimal> {
        let base = self
            .config
            .base_asset(symbol)
            .ok_or_else(|| anyhow!("{} is not quoted in {}", symbol, self.config.quote_asset))?;
        self.exchange
            .free_balance(base, self.executor.account())
            .await
            .with_context(|| format!("Failed to fetch {} balance", base))
    }

    async fn quote_balance(&self) -> Result<Decimal> {
        self.exchange
            .free_balance(&self.config.quote_asset, self.executor.account())
            .await
            .with_context(|| format!("Failed to fetch {} balance", self.config.quote_asset))
    }

    /// Run one decision cycle.
    ///
    /// Any error leaves the position untouched.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.executor.begin_cycle().await;
        if self.limits.roll_over(Utc::now().date_naive()) {
            self.persist();
        }

        self.reconcile().await?;

        // Take-profit/stop-loss on a held alt only needs that pair.
        let candidates = match (self.config.mode, self.position.symbol()) {
            (RotationMode::TakeProfitStopLoss, Some(held)) => vec![held.to_string()],
            _ => self.config.symbols.clone(),
        };
        let scores = self.collect_scores(&candidates).await?;

        let quote_balance = self.quote_balance().await?;
        let (held_price, held_balance) = match self.position.symbol() {
            Some(symbol) => {
                let price = match scores.iter().find(|s| s.symbol == symbol) {
                    Some(score) => score.price,
                    None => self
                        .exchange
                        .price(symbol)
                        .await
                        .with_context(|| format!("Failed to price {}", symbol))?,
                };
                (Some(price), self.base_balance(symbol).await?)
            }
            None => (None, Decimal::ZERO),
        };

        let equity = quote_balance + held_balance * held_price.unwrap_or(Decimal::ZERO);
        self.state.equity = Some(equity);

        let view = MarketView {
            scores,
            held_price,
            quote_balance,
        };
        let decision = decide(&self.position, &view, &self.config, self.limits.entries_allowed());

        info!(
            position = %self.position,
            scored = view.scores.len(),
            %quote_balance,
            %equity,
            decision = ?decision,
            "📊 [CYCLE] Decision"
        );

        match &decision {
            Decision::Hold { reason } => debug!(%reason, "Holding"),
            Decision::NoCandidate => info!("📊 [CYCLE] No candidate with data"),
            Decision::Enter { symbol, price, .. } => {
                self.enter(symbol, quote_balance, *price).await?;
            }
            Decision::Exit { symbol, reason, .. } => {
                info!(%symbol, %reason, "🎯 [EXIT] Leaving position");
                if let Some(price) = held_price {
                    self.exit(symbol, held_balance, price).await?;
                }
            }
            Decision::Rotate {
                from,
                to,
                edge,
                price,
            } => {
                info!(%from, %to, %edge, "🔄 [ROTATE] Switching position");
                let sold = match held_price {
                    Some(held) => self.exit(from, held_balance, held).await?,
                    None => false,
                };
                if sold {
                    let quote_balance = self.quote_balance().await?;
                    self.enter(to, quote_balance, *price).await?;
                }
            }
        }

        self.persist();

        Ok(CycleReport {
            decision,
            position: self.position.clone(),
            scored: view.scores.len(),
            equity,
        })
    }

    /// Score `symbols` in order. Pairs without data are left out; any
    /// provider error fails the whole set.
    async fn collect_scores(&self, symbols: &[String]) -> Result<Vec<SymbolScore>> {
        let mut scores = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let snapshot = self
                .snapshots
                .snapshot(symbol)
                .await
                .with_context(|| format!("Snapshot failed for {}", symbol))?;
            match snapshot {
                Some(snap) => {
                    scores.push(SymbolScore::from_snapshot(&snap, self.config.score_weight))
                }
                None => debug!(%symbol, "No data this cycle"),
            }
        }
        Ok(scores)
    }

    /// Buy `symbol`. Any executed quantity moves the position into it.
    async fn enter(
        &mut self,
        symbol: &str,
        quote_balance: Decimal,
        price: Decimal,
    ) -> Result<bool> {
        let result = self.executor.buy(symbol, quote_balance, price).await?;
        let Some(outcome) = result.outcome() else {
            return Ok(false);
        };
        if let OrderOutcome::Unknown { .. } = outcome {
            self.mark_unsettled(symbol);
            return Ok(false);
        }
        let Some((executed_qty, avg_price)) = outcome.fill() else {
            return Ok(false);
        };

        self.position = Position::HoldingAlt {
            symbol: symbol.to_string(),
            entry_price: avg_price,
        };
        self.limits.record_trade();
        self.state.total_trades += 1;
        self.state.last_trade_at = Some(Utc::now());

        info!(%symbol, %executed_qty, entry_price = %avg_price, "📈 [ENTER] Position opened");
        self.persist();
        Ok(true)
    }

    /// Sell the held balance of `symbol`. Returns true once fully out.
    async fn exit(&mut self, symbol: &str, balance: Decimal, price: Decimal) -> Result<bool> {
        let Position::HoldingAlt { entry_price, .. } = self.position.clone() else {
            return Ok(false);
        };

        let result = self.executor.sell(symbol, balance, price).await?;
        let Some(outcome) = result.outcome() else {
            return Ok(false);
        };
        if let OrderOutcome::Unknown { .. } = outcome {
            self.mark_unsettled(symbol);
            return Ok(false);
        }
        let Some((executed_qty, avg_price)) = outcome.fill() else {
            return Ok(false);
        };

        let pnl = (avg_price - entry_price) * executed_qty;
        self.state.realized_pnl += pnl;
        self.state.total_trades += 1;
        self.state.last_trade_at = Some(Utc::now());

        if !outcome.is_filled() {
            warn!(%symbol, %executed_qty, "⚠️  [EXIT] Partial sell, remainder retried next cycle");
            self.persist();
            return Ok(false);
        }

        if pnl < Decimal::ZERO {
            self.limits.record_loss();
        }
        self.position = Position::HoldingQuote;

        info!(
            %symbol,
            %executed_qty,
            exit_price = %avg_price,
            %pnl,
            realized_total = %self.state.realized_pnl,
            "📉 [EXIT] Position closed"
        );
        self.persist();
        Ok(true)
    }

    fn persist(&mut self) {
        match &self.position {
            Position::HoldingQuote => {
                self.state.holding = None;
                self.state.entry_price = None;
            }
            Position::HoldingAlt {
                symbol,
                entry_price,
            } => {
                self.state.holding = Some(symbol.clone());
                self.state.entry_price = Some(*entry_price);
            }
        }
        self.state.trading_day = Some(self.limits.day());
        self.state.trades_today = self.limits.trades();
        self.state.losses_today = self.limits.losses();

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.state) {
                warn!("⚠️  [PERSISTENCE] Failed to save state: {:#}", e);
            }
        }
    }
}
