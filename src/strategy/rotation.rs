//! Rotation decision logic.
//!
//! [`decide`] is pure: it takes the current position, this cycle's scores
//! and the rotation settings, and says what should happen. Execution and
//! state transitions live in the rotator.

use super::scoring::{edge, select_best, SymbolScore};
use crate::config::{RotationConfig, RotationMode};
use crate::utils::decimal::pct_change;
use rust_decimal::Decimal;
use std::fmt;

/// What the bot currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    HoldingQuote,
    HoldingAlt { symbol: String, entry_price: Decimal },
}

impl Position {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Position::HoldingQuote => None,
            Position::HoldingAlt { symbol, .. } => Some(symbol),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::HoldingQuote => f.write_str("quote"),
            Position::HoldingAlt {
                symbol,
                entry_price,
            } => write!(f, "{} @ {}", symbol, entry_price),
        }
    }
}

/// Inputs for one decision.
#[derive(Debug, Clone, Default)]
pub struct MarketView {
    /// Scores of candidates with data, in configured order
    pub scores: Vec<SymbolScore>,
    /// Current price of the held alt, if any
    pub held_price: Option<Decimal>,
    /// Free quote balance
    pub quote_balance: Decimal,
}

impl MarketView {
    pub fn score_of(&self, symbol: &str) -> Option<&SymbolScore> {
        self.scores.iter().find(|s| s.symbol == symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => f.write_str("take-profit"),
            ExitReason::StopLoss => f.write_str("stop-loss"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldReason {
    BalanceTooLow { balance: Decimal },
    WithinBand { pnl_pct: Decimal },
    NoPrice,
    EdgeTooSmall { edge: Decimal },
    AlreadyBest,
    HeldSymbolNoData,
    DailyLimitReached,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::BalanceTooLow { balance } => write!(f, "quote balance {} too low", balance),
            HoldReason::WithinBand { pnl_pct } => {
                write!(f, "pnl {:.3}% inside TP/SL band", pnl_pct)
            }
            HoldReason::NoPrice => f.write_str("no price for held symbol"),
            HoldReason::EdgeTooSmall { edge } => write!(f, "edge {:.3}% below minimum", edge),
            HoldReason::AlreadyBest => f.write_str("held symbol is already the best"),
            HoldReason::HeldSymbolNoData => f.write_str("held symbol has no data this cycle"),
            HoldReason::DailyLimitReached => f.write_str("daily trade limit reached"),
        }
    }
}

/// Outcome of one decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Hold {
        reason: HoldReason,
    },
    Enter {
        symbol: String,
        score: Decimal,
        price: Decimal,
    },
    Exit {
        symbol: String,
        reason: ExitReason,
        pnl_pct: Decimal,
    },
    Rotate {
        from: String,
        to: String,
        edge: Decimal,
        price: Decimal,
    },
    NoCandidate,
}

/// Decide what to do this cycle.
///
/// `entries_allowed` is false once a daily limit is hit; exits still go
/// through.
pub fn decide(
    position: &Position,
    view: &MarketView,
    config: &RotationConfig,
    entries_allowed: bool,
) -> Decision {
    match config.mode {
        RotationMode::TakeProfitStopLoss => {
            decide_take_profit_stop_loss(position, view, config, entries_allowed)
        }
        RotationMode::Edge => decide_edge(position, view, config, entries_allowed),
    }
}

fn decide_take_profit_stop_loss(
    position: &Position,
    view: &MarketView,
    config: &RotationConfig,
    entries_allowed: bool,
) -> Decision {
    match position {
        Position::HoldingQuote => {
            let Some(best) = select_best(&view.scores, config.selection) else {
                return Decision::NoCandidate;
            };
            enter(best, view, config, entries_allowed)
        }
        Position::HoldingAlt {
            symbol,
            entry_price,
        } => {
            let Some(price) = view.held_price else {
                return Decision::Hold {
                    reason: HoldReason::NoPrice,
                };
            };
            let Some(pnl_pct) = pct_change(*entry_price, price) else {
                return Decision::Hold {
                    reason: HoldReason::NoPrice,
                };
            };

            if pnl_pct >= config.take_profit_pct {
                Decision::Exit {
                    symbol: symbol.clone(),
                    reason: ExitReason::TakeProfit,
                    pnl_pct,
                }
            } else if pnl_pct <= -config.stop_loss_pct {
                Decision::Exit {
                    symbol: symbol.clone(),
                    reason: ExitReason::StopLoss,
                    pnl_pct,
                }
            } else {
                Decision::Hold {
                    reason: HoldReason::WithinBand { pnl_pct },
                }
            }
        }
    }
}

fn decide_edge(
    position: &Position,
    view: &MarketView,
    config: &RotationConfig,
    entries_allowed: bool,
) -> Decision {
    let Some(best) = select_best(&view.scores, config.selection) else {
        return match position {
            Position::HoldingQuote => Decision::NoCandidate,
            Position::HoldingAlt { .. } => Decision::Hold {
                reason: HoldReason::HeldSymbolNoData,
            },
        };
    };

    match position {
        Position::HoldingQuote => {
            // Quote has a flat score.
            let edge = edge(best.score, Decimal::ZERO, config.selection);
            if edge < config.min_edge_pct {
                return Decision::Hold {
                    reason: HoldReason::EdgeTooSmall { edge },
                };
            }
            enter(best, view, config, entries_allowed)
        }
        Position::HoldingAlt { symbol, .. } => {
            let Some(current) = view.score_of(symbol) else {
                return Decision::Hold {
                    reason: HoldReason::HeldSymbolNoData,
                };
            };
            if best.symbol == *symbol {
                return Decision::Hold {
                    reason: HoldReason::AlreadyBest,
                };
            }

            let edge = edge(best.score, current.score, config.selection);
            if edge < config.min_edge_pct {
                return Decision::Hold {
                    reason: HoldReason::EdgeTooSmall { edge },
                };
            }
            if !entries_allowed {
                return Decision::Hold {
                    reason: HoldReason::DailyLimitReached,
                };
            }

            Decision::Rotate {
                from: symbol.clone(),
                to: best.symbol.clone(),
                edge,
                price: best.price,
            }
        }
    }
}

fn enter(
    best: &SymbolScore,
    view: &MarketView,
    config: &RotationConfig,
    entries_allowed: bool,
) -> Decision {
    if view.quote_balance <= config.min_quote_balance {
        return Decision::Hold {
            reason: HoldReason::BalanceTooLow {
                balance: view.quote_balance,
            },
        };
    }
    if !entries_allowed {
        return Decision::Hold {
            reason: HoldReason::DailyLimitReached,
        };
    }

    Decision::Enter {
        symbol: best.symbol.clone(),
        score: best.score,
        price: best.price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionDirection;
    use rust_decimal_macros::dec;

    fn tp_sl_config() -> RotationConfig {
        RotationConfig {
            mode: RotationMode::TakeProfitStopLoss,
            selection: SelectionDirection::Highest,
            take_profit_pct: dec!(0.40),
            stop_loss_pct: dec!(0.80),
            ..Default::default()
        }
    }

    fn edge_config(min_edge: Decimal) -> RotationConfig {
        RotationConfig {
            mode: RotationMode::Edge,
            selection: SelectionDirection::Highest,
            min_edge_pct: min_edge,
            ..Default::default()
        }
    }

    fn score(symbol: &str, score: Decimal) -> SymbolScore {
        SymbolScore {
            symbol: symbol.to_string(),
            score,
            price: dec!(10),
        }
    }

    fn holding(symbol: &str, entry: Decimal) -> Position {
        Position::HoldingAlt {
            symbol: symbol.to_string(),
            entry_price: entry,
        }
    }

    fn view_at(held_price: Decimal) -> MarketView {
        MarketView {
            scores: vec![],
            held_price: Some(held_price),
            quote_balance: Decimal::ZERO,
        }
    }

    #[test]
    fn test_take_profit_boundary_is_inclusive() {
        let config = tp_sl_config();
        let pos = holding("SOLUSDC", dec!(100));

        assert!(matches!(
            decide(&pos, &view_at(dec!(100.40)), &config, true),
            Decision::Exit {
                reason: ExitReason::TakeProfit,
                ..
            }
        ));
        assert!(matches!(
            decide(&pos, &view_at(dec!(100.39)), &config, true),
            Decision::Hold {
                reason: HoldReason::WithinBand { .. }
            }
        ));
    }

    #[test]
    fn test_stop_loss_boundary_is_inclusive() {
        let config = tp_sl_config();
        let pos = holding("SOLUSDC", dec!(100));

        assert!(matches!(
            decide(&pos, &view_at(dec!(99.20)), &config, true),
            Decision::Exit {
                reason: ExitReason::StopLoss,
                ..
            }
        ));
        assert!(matches!(
            decide(&pos, &view_at(dec!(99.21)), &config, true),
            Decision::Hold { .. }
        ));
    }

    #[test]
    fn test_exit_ignores_daily_limit() {
        let config = tp_sl_config();
        let pos = holding("SOLUSDC", dec!(100));

        assert!(matches!(
            decide(&pos, &view_at(dec!(98)), &config, false),
            Decision::Exit { .. }
        ));
    }

    #[test]
    fn test_holding_alt_without_price_holds() {
        let config = tp_sl_config();
        let view = MarketView::default();

        assert_eq!(
            decide(&holding("SOLUSDC", dec!(100)), &view, &config, true),
            Decision::Hold {
                reason: HoldReason::NoPrice
            }
        );
    }

    #[test]
    fn test_enter_best_from_quote() {
        let config = tp_sl_config();
        let view = MarketView {
            scores: vec![score("A", dec!(0.5)), score("B", dec!(2.0))],
            held_price: None,
            quote_balance: dec!(100),
        };

        assert_eq!(
            decide(&Position::HoldingQuote, &view, &config, true),
            Decision::Enter {
                symbol: "B".to_string(),
                score: dec!(2.0),
                price: dec!(10),
            }
        );
    }

    #[test]
    fn test_low_balance_holds() {
        let config = tp_sl_config();
        let view = MarketView {
            scores: vec![score("A", dec!(0.5))],
            held_price: None,
            quote_balance: config.min_quote_balance,
        };

        assert!(matches!(
            decide(&Position::HoldingQuote, &view, &config, true),
            Decision::Hold {
                reason: HoldReason::BalanceTooLow { .. }
            }
        ));
    }

    #[test]
    fn test_no_data_means_no_candidate() {
        let config = tp_sl_config();
        let view = MarketView {
            quote_balance: dec!(100),
            ..Default::default()
        };

        assert_eq!(
            decide(&Position::HoldingQuote, &view, &config, true),
            Decision::NoCandidate
        );
    }

    #[test]
    fn test_missing_candidates_are_not_treated_as_zero() {
        // Only negative scores have data; a missing pair must not win as 0.
        let config = tp_sl_config();
        let view = MarketView {
            scores: vec![score("A", dec!(-1.5)), score("C", dec!(-0.7))],
            held_price: None,
            quote_balance: dec!(100),
        };

        match decide(&Position::HoldingQuote, &view, &config, true) {
            Decision::Enter { symbol, .. } => assert_eq!(symbol, "C"),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_entry_blocked_by_daily_limit() {
        let config = tp_sl_config();
        let view = MarketView {
            scores: vec![score("A", dec!(1))],
            held_price: None,
            quote_balance: dec!(100),
        };

        assert_eq!(
            decide(&Position::HoldingQuote, &view, &config, false),
            Decision::Hold {
                reason: HoldReason::DailyLimitReached
            }
        );
    }

    #[test]
    fn test_edge_below_minimum_holds() {
        let config = edge_config(dec!(0.20));
        let view = MarketView {
            scores: vec![score("CUR", dec!(1.00)), score("NEW", dec!(1.05))],
            held_price: Some(dec!(10)),
            quote_balance: Decimal::ZERO,
        };

        assert_eq!(
            decide(&holding("CUR", dec!(10)), &view, &config, true),
            Decision::Hold {
                reason: HoldReason::EdgeTooSmall { edge: dec!(0.05) }
            }
        );
    }

    #[test]
    fn test_edge_above_minimum_rotates() {
        let config = edge_config(dec!(0.20));
        let view = MarketView {
            scores: vec![score("CUR", dec!(1.00)), score("NEW", dec!(1.30))],
            held_price: Some(dec!(10)),
            quote_balance: Decimal::ZERO,
        };

        assert_eq!(
            decide(&holding("CUR", dec!(10)), &view, &config, true),
            Decision::Rotate {
                from: "CUR".to_string(),
                to: "NEW".to_string(),
                edge: dec!(0.30),
                price: dec!(10),
            }
        );
    }

    #[test]
    fn test_edge_holds_when_already_best() {
        let config = edge_config(dec!(0.20));
        let view = MarketView {
            scores: vec![score("CUR", dec!(3)), score("NEW", dec!(1))],
            held_price: Some(dec!(10)),
            quote_balance: Decimal::ZERO,
        };

        assert_eq!(
            decide(&holding("CUR", dec!(10)), &view, &config, true),
            Decision::Hold {
                reason: HoldReason::AlreadyBest
            }
        );
    }

    #[test]
    fn test_edge_holds_when_held_symbol_has_no_data() {
        let config = edge_config(dec!(0.20));
        let view = MarketView {
            scores: vec![score("NEW", dec!(5))],
            held_price: Some(dec!(10)),
            quote_balance: Decimal::ZERO,
        };

        assert_eq!(
            decide(&holding("CUR", dec!(10)), &view, &config, true),
            Decision::Hold {
                reason: HoldReason::HeldSymbolNoData
            }
        );
    }

    #[test]
    fn test_edge_from_quote_measures_against_flat() {
        let config = edge_config(dec!(0.20));
        let mut view = MarketView {
            scores: vec![score("A", dec!(0.15))],
            held_price: None,
            quote_balance: dec!(100),
        };

        assert!(matches!(
            decide(&Position::HoldingQuote, &view, &config, true),
            Decision::Hold {
                reason: HoldReason::EdgeTooSmall { .. }
            }
        ));

        view.scores = vec![score("A", dec!(0.25))];
        assert!(matches!(
            decide(&Position::HoldingQuote, &view, &config, true),
            Decision::Enter { .. }
        ));
    }

    #[test]
    fn test_edge_lowest_direction() {
        let config = RotationConfig {
            selection: SelectionDirection::Lowest,
            ..edge_config(dec!(0.20))
        };
        let view = MarketView {
            scores: vec![score("CUR", dec!(-1.0)), score("NEW", dec!(-1.5))],
            held_price: Some(dec!(10)),
            quote_balance: Decimal::ZERO,
        };

        assert!(matches!(
            decide(&holding("CUR", dec!(10)), &view, &config, true),
            Decision::Rotate { .. }
        ));
    }
}
