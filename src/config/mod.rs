//! Configuration management for the alt rotator.
//!
//! Loads settings from an optional `config.toml` overlaid by environment
//! variables (`ROTATOR__SECTION__FIELD`). The resulting [`Config`] is built
//! once at startup and handed to components by reference.

use crate::market::ScoreWindow;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Binance API credentials and trading mode
    #[serde(default)]
    pub binance: BinanceConfig,
    /// Rotation rules and candidate universe
    #[serde(default)]
    pub rotation: RotationConfig,
    /// Market data source and scoring window
    #[serde(default)]
    pub market: MarketConfig,
    /// Cross margin settings
    #[serde(default)]
    pub margin: MarginConfig,
    /// Loop timing and execution cost model
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Daily trade/loss limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// State file locations
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key for signing requests
    #[serde(default)]
    pub secret_key: String,
    /// Use testnet instead of production
    #[serde(default)]
    pub testnet: bool,
    /// Send real orders (false = paper trading against live market data)
    #[serde(default)]
    pub live_trading: bool,
}

/// How the rotator decides to move between positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Buy the best candidate from quote, exit on take-profit / stop-loss.
    TakeProfitStopLoss,
    /// Always hold the best candidate, switching when the edge is large enough.
    Edge,
}

/// Which end of the score ranking counts as "best".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionDirection {
    /// Highest score wins (momentum chasing)
    Highest,
    /// Lowest score wins (buy the most punished pair)
    Lowest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Stable asset the bot returns to between trades
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Candidate pairs in priority order (ties resolve to the earliest)
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_mode")]
    pub mode: RotationMode,
    #[serde(default = "default_selection")]
    pub selection: SelectionDirection,
    /// Multiplier applied to every raw percentage change
    #[serde(default = "default_score_weight")]
    pub score_weight: Decimal,
    /// Fraction of free quote balance committed on entry (0.0-1.0)
    #[serde(default = "default_capital_fraction")]
    pub capital_fraction: Decimal,
    /// Quote balance at or below which no entry is attempted
    #[serde(default = "default_min_quote_balance")]
    pub min_quote_balance: Decimal,
    /// Take profit in percent (0.40 = +0.40%)
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Stop loss in percent (0.80 = -0.80%)
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Minimum score edge in percentage points required to rotate
    #[serde(default = "default_min_edge_pct")]
    pub min_edge_pct: Decimal,
}

/// Where snapshots come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Poll REST endpoints every cycle
    Rest,
    /// Read a cache fed by the kline WebSocket stream
    Stream,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_source")]
    pub source: SnapshotSource,
    /// Scoring window: "24h" or a kline interval such as "15m" / "1h"
    #[serde(default = "default_window")]
    pub window: ScoreWindow,
    /// Refetch lot size / notional filters at the start of every cycle
    #[serde(default)]
    pub refresh_filters_every_cycle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginConfig {
    /// Trade through the cross margin account with auto borrow/repay
    #[serde(default)]
    pub enabled: bool,
    /// Capital multiplier applied to entries in margin mode
    #[serde(default = "default_leverage")]
    pub leverage: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Seconds between cycles
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Cooldown after a failed cycle, as a multiple of the cycle interval
    #[serde(default = "default_error_cooldown_multiplier")]
    pub error_cooldown_multiplier: u32,
    /// Taker fee per side in percent (0.10 = 0.10%)
    #[serde(default = "default_fee_pct")]
    pub fee_pct: Decimal,
    /// Expected slippage per round trip in percent
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: Decimal,
    /// min_edge_pct must exceed round-trip cost times this factor
    #[serde(default = "default_edge_safety_factor")]
    pub edge_safety_factor: Decimal,
    /// Allowed shortfall of executed vs requested quantity, in percent
    #[serde(default = "default_fill_tolerance_pct")]
    pub fill_tolerance_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum entries per UTC day (0 = unlimited)
    #[serde(default)]
    pub max_trades_per_day: u32,
    /// Maximum losing exits per UTC day before entries stop (0 = unlimited)
    #[serde(default)]
    pub max_losses_per_day: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Bot state JSON file; unset disables persistence
    #[serde(default = "default_state_path")]
    pub state_path: Option<String>,
    /// Simulated balances for paper trading
    #[serde(default = "default_paper_state_path")]
    pub paper_state_path: String,
    /// Starting quote balance for a fresh paper account
    #[serde(default = "default_paper_balance")]
    pub paper_initial_balance: Decimal,
}

// Default value functions
fn default_quote_asset() -> String {
    "USDC".to_string()
}

fn default_symbols() -> Vec<String> {
    [
        "DOTUSDC", "AVAXUSDC", "NEARUSDC", "ATOMUSDC", "SOLUSDC", "XRPUSDC", "ADAUSDC",
        "DOGEUSDC", "FILUSDC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_mode() -> RotationMode {
    RotationMode::TakeProfitStopLoss
}

fn default_selection() -> SelectionDirection {
    SelectionDirection::Lowest
}

fn default_score_weight() -> Decimal {
    Decimal::ONE
}

fn default_capital_fraction() -> Decimal {
    Decimal::new(98, 2) // 0.98
}

fn default_min_quote_balance() -> Decimal {
    Decimal::ONE
}

fn default_take_profit_pct() -> Decimal {
    Decimal::new(40, 2) // 0.40%
}

fn default_stop_loss_pct() -> Decimal {
    Decimal::new(80, 2) // 0.80%
}

fn default_min_edge_pct() -> Decimal {
    Decimal::new(40, 2) // 0.40 percentage points
}

fn default_source() -> SnapshotSource {
    SnapshotSource::Rest
}

fn default_window() -> ScoreWindow {
    ScoreWindow::Rolling24h
}

fn default_leverage() -> u8 {
    1
}

fn default_cycle_interval() -> u64 {
    8
}

fn default_error_cooldown_multiplier() -> u32 {
    2
}

fn default_fee_pct() -> Decimal {
    Decimal::new(10, 2) // 0.10% spot taker
}

fn default_slippage_pct() -> Decimal {
    Decimal::new(5, 2) // 0.05%
}

fn default_edge_safety_factor() -> Decimal {
    Decimal::new(15, 1) // 1.5x
}

fn default_fill_tolerance_pct() -> Decimal {
    Decimal::new(1, 1) // 0.1%
}

fn default_state_path() -> Option<String> {
    Some("data/bot_state.json".to_string())
}

fn default_paper_state_path() -> String {
    "data/paper_state.json".to_string()
}

fn default_paper_balance() -> Decimal {
    Decimal::new(1000, 0)
}

impl RotationConfig {
    /// Base asset of a configured pair (e.g. "SOL" for "SOLUSDC").
    pub fn base_asset<'a>(&self, symbol: &'a str) -> Option<&'a str> {
        symbol
            .strip_suffix(self.quote_asset.as_str())
            .filter(|base| !base.is_empty())
    }
}

impl ExecutionConfig {
    /// Estimated cost of selling one asset and buying another, in percent.
    pub fn round_trip_cost_pct(&self) -> Decimal {
        self.fee_pct * Decimal::TWO + self.slippage_pct
    }

    /// Smallest edge that clears round-trip cost with the safety factor applied.
    pub fn edge_floor_pct(&self) -> Decimal {
        self.round_trip_cost_pct() * self.edge_safety_factor
    }
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("ROTATOR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("rotation.symbols"),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_legacy_env();
        Ok(config)
    }

    /// Fall back to `BINANCE_API_KEY`, `BINANCE_SECRET_KEY` and
    /// `LIVE_TRADING` when the prefixed variables are absent.
    fn apply_legacy_env(&mut self) {
        if self.binance.api_key.is_empty() {
            self.binance.api_key = std::env::var("BINANCE_API_KEY").unwrap_or_default();
        }
        if self.binance.secret_key.is_empty() {
            self.binance.secret_key = std::env::var("BINANCE_SECRET_KEY").unwrap_or_default();
        }
        if let Ok(flag) = std::env::var("LIVE_TRADING") {
            self.binance.live_trading = flag.eq_ignore_ascii_case("true");
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let rotation = &self.rotation;

        anyhow::ensure!(
            !rotation.quote_asset.is_empty(),
            "quote_asset must not be empty"
        );
        anyhow::ensure!(!rotation.symbols.is_empty(), "symbols must not be empty");
        for symbol in &rotation.symbols {
            anyhow::ensure!(
                rotation.base_asset(symbol).is_some(),
                "symbol {} is not quoted in {}",
                symbol,
                rotation.quote_asset
            );
        }

        anyhow::ensure!(
            rotation.capital_fraction > Decimal::ZERO && rotation.capital_fraction <= Decimal::ONE,
            "capital_fraction must be between 0 and 1"
        );
        anyhow::ensure!(
            rotation.score_weight != Decimal::ZERO,
            "score_weight must be non-zero"
        );
        anyhow::ensure!(
            rotation.min_quote_balance >= Decimal::ZERO,
            "min_quote_balance must not be negative"
        );

        match rotation.mode {
            RotationMode::TakeProfitStopLoss => {
                anyhow::ensure!(
                    rotation.take_profit_pct > Decimal::ZERO,
                    "take_profit_pct must be positive"
                );
                anyhow::ensure!(
                    rotation.stop_loss_pct > Decimal::ZERO,
                    "stop_loss_pct must be positive"
                );
            }
            RotationMode::Edge => {
                let floor = self.execution.edge_floor_pct();
                anyhow::ensure!(
                    rotation.min_edge_pct > floor,
                    "min_edge_pct {}% must exceed round-trip cost x safety factor ({}%)",
                    rotation.min_edge_pct,
                    floor
                );
            }
        }

        if self.market.source == SnapshotSource::Stream {
            anyhow::ensure!(
                self.market.window.interval().is_some(),
                "stream source requires a kline window (e.g. 15m), not 24h"
            );
        }

        anyhow::ensure!(
            self.margin.leverage >= 1 && self.margin.leverage <= 10,
            "leverage must be between 1 and 10"
        );
        anyhow::ensure!(
            self.margin.enabled || self.margin.leverage == 1,
            "leverage above 1 requires margin.enabled"
        );

        anyhow::ensure!(
            self.execution.cycle_interval_secs > 0,
            "cycle_interval_secs must be positive"
        );
        anyhow::ensure!(
            self.execution.edge_safety_factor >= Decimal::ONE,
            "edge_safety_factor must be at least 1"
        );

        if self.binance.live_trading {
            anyhow::ensure!(
                !self.binance.api_key.is_empty() && !self.binance.secret_key.is_empty(),
                "live trading requires BINANCE_API_KEY and BINANCE_SECRET_KEY"
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binance: BinanceConfig::default(),
            rotation: RotationConfig::default(),
            market: MarketConfig::default(),
            margin: MarginConfig::default(),
            execution: ExecutionConfig::default(),
            limits: LimitsConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            testnet: false,
            live_trading: false,
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            quote_asset: default_quote_asset(),
            symbols: default_symbols(),
            mode: default_mode(),
            selection: default_selection(),
            score_weight: default_score_weight(),
            capital_fraction: default_capital_fraction(),
            min_quote_balance: default_min_quote_balance(),
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            min_edge_pct: default_min_edge_pct(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            window: default_window(),
            refresh_filters_every_cycle: false,
        }
    }
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            leverage: default_leverage(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            error_cooldown_multiplier: default_error_cooldown_multiplier(),
            fee_pct: default_fee_pct(),
            slippage_pct: default_slippage_pct(),
            edge_safety_factor: default_edge_safety_factor(),
            fill_tolerance_pct: default_fill_tolerance_pct(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_trades_per_day: 0,
            max_losses_per_day: 0,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            paper_state_path: default_paper_state_path(),
            paper_initial_balance: default_paper_balance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::KlineInterval;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_edge_mode_rejects_edge_below_cost_floor() {
        let mut config = Config::default();
        config.rotation.mode = RotationMode::Edge;
        // (0.10 * 2 + 0.05) * 1.5 = 0.375
        config.rotation.min_edge_pct = dec!(0.375);
        assert!(config.validate().is_err());

        config.rotation.min_edge_pct = dec!(0.38);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_live_trading_requires_credentials() {
        let mut config = Config::default();
        config.binance.live_trading = true;
        assert!(config.validate().is_err());

        config.binance.api_key = "key".to_string();
        config.binance.secret_key = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_symbols_must_use_quote_asset() {
        let mut config = Config::default();
        config.rotation.symbols = vec!["SOLUSDT".to_string()];
        assert!(config.validate().is_err());

        config.rotation.symbols = vec!["USDC".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_source_needs_kline_window() {
        let mut config = Config::default();
        config.market.source = SnapshotSource::Stream;
        assert!(config.validate().is_err());

        config.market.window = ScoreWindow::Candle(KlineInterval::Minutes15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_leverage_requires_margin() {
        let mut config = Config::default();
        config.margin.leverage = 3;
        assert!(config.validate().is_err());

        config.margin.enabled = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_asset() {
        let rotation = RotationConfig::default();
        assert_eq!(rotation.base_asset("SOLUSDC"), Some("SOL"));
        assert_eq!(rotation.base_asset("SOLUSDT"), None);
    }

    #[test]
    fn test_round_trip_cost() {
        let execution = ExecutionConfig::default();
        assert_eq!(execution.round_trip_cost_pct(), dec!(0.25));
        assert_eq!(execution.edge_floor_pct(), dec!(0.375));
    }
}
