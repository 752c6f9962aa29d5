//! Rotation strategy.
//!
//! Contains the core logic for:
//! - Order sizing against exchange filters
//! - Candidate scoring and selection
//! - Take-profit/stop-loss and edge rotation decisions
//! - Order execution and fill classification
//! - The single-position rotator driving each cycle

mod executor;
mod rotation;
mod rotator;
mod scoring;
mod sizing;

pub use executor::{classify, ExecutionResult, FillPriceSource, OrderExecutor, OrderOutcome};
pub use rotation::{decide, Decision, ExitReason, HoldReason, MarketView, Position};
pub use rotator::{CycleReport, Rotator};
pub use scoring::{edge, is_better, select_best, SymbolScore};
pub use sizing::{qty_from_balance, qty_from_capital, Infeasible};
