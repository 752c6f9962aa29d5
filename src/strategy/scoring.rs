//! Candidate scoring and selection.

use crate::config::SelectionDirection;
use crate::market::Snapshot;
use rust_decimal::Decimal;

/// Score of one pair for the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolScore {
    pub symbol: String,
    /// Weighted percentage change over the score window
    pub score: Decimal,
    pub price: Decimal,
}

impl SymbolScore {
    pub fn from_snapshot(snapshot: &Snapshot, weight: Decimal) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            score: snapshot.change_pct * weight,
            price: snapshot.price,
        }
    }
}

/// Whether `candidate` beats `incumbent` in the given direction.
pub fn is_better(candidate: Decimal, incumbent: Decimal, direction: SelectionDirection) -> bool {
    match direction {
        SelectionDirection::Highest => candidate > incumbent,
        SelectionDirection::Lowest => candidate < incumbent,
    }
}

/// Best-scoring candidate. On ties the earliest entry wins.
pub fn select_best(scores: &[SymbolScore], direction: SelectionDirection) -> Option<&SymbolScore> {
    scores.iter().fold(None, |best, candidate| match best {
        Some(current) if !is_better(candidate.score, current.score, direction) => Some(current),
        _ => Some(candidate),
    })
}

/// Advantage of `best` over `current` measured in the selection direction.
///
/// Always positive when `best` is strictly better.
pub fn edge(best: Decimal, current: Decimal, direction: SelectionDirection) -> Decimal {
    match direction {
        SelectionDirection::Highest => best - current,
        SelectionDirection::Lowest => current - best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn score(symbol: &str, score: Decimal) -> SymbolScore {
        SymbolScore {
            symbol: symbol.to_string(),
            score,
            price: dec!(1),
        }
    }

    #[test]
    fn test_select_highest() {
        let scores = vec![score("A", dec!(1)), score("B", dec!(3)), score("C", dec!(2))];
        assert_eq!(select_best(&scores, SelectionDirection::Highest).unwrap().symbol, "B");
    }

    #[test]
    fn test_select_lowest() {
        let scores = vec![score("A", dec!(1)), score("B", dec!(-3)), score("C", dec!(2))];
        assert_eq!(select_best(&scores, SelectionDirection::Lowest).unwrap().symbol, "B");
    }

    #[test]
    fn test_tie_keeps_first_in_order() {
        let scores = vec![score("A", dec!(2.00)), score("B", dec!(2.00))];
        assert_eq!(select_best(&scores, SelectionDirection::Highest).unwrap().symbol, "A");
        assert_eq!(select_best(&scores, SelectionDirection::Lowest).unwrap().symbol, "A");
    }

    #[test]
    fn test_empty_has_no_best() {
        assert!(select_best(&[], SelectionDirection::Highest).is_none());
    }

    #[test]
    fn test_weight_is_applied() {
        let snapshot = Snapshot {
            symbol: "SOLUSDC".to_string(),
            price: dec!(150),
            change_pct: dec!(1.5),
        };

        let weighted = SymbolScore::from_snapshot(&snapshot, dec!(-2));

        assert_eq!(weighted.score, dec!(-3.0));
        assert_eq!(weighted.price, dec!(150));
    }

    #[test]
    fn test_edge_follows_direction() {
        assert_eq!(edge(dec!(1.30), dec!(1.00), SelectionDirection::Highest), dec!(0.30));
        assert_eq!(edge(dec!(-2.5), dec!(-1.0), SelectionDirection::Lowest), dec!(1.5));
    }
}
