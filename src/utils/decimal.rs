//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Binance rejects quantities with more than 8 fractional digits.
pub const MAX_QTY_DECIMALS: u32 = 8;

/// Round down to lot size (quantity precision).
///
/// A zero lot size leaves the value unquantized apart from truncation to
/// [`MAX_QTY_DECIMALS`].
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    let quantized = if lot_size <= Decimal::ZERO {
        value
    } else {
        (value / lot_size).floor() * lot_size
    };
    quantized
        .trunc_with_scale(MAX_QTY_DECIMALS)
        .normalize()
}

/// Percentage change from `from` to `to` (e.g. 100 -> 101 = 1).
///
/// Returns `None` when `from` is zero.
pub fn pct_change(from: Decimal, to: Decimal) -> Option<Decimal> {
    if from == Decimal::ZERO {
        return None;
    }
    Some((to - from) / from * dec!(100))
}

/// Convert a percentage (0.1 = 0.1%) into a fraction (0.001).
pub fn pct_to_fraction(pct: Decimal) -> Decimal {
    pct / dec!(100)
}

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Calculate weighted average.
pub fn weighted_average(values: &[(Decimal, Decimal)]) -> Decimal {
    let (sum, weight_sum) = values.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(sum, weight_sum), (val, weight)| (sum + val * weight, weight_sum + weight),
    );

    safe_div(sum, weight_sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_down_to_lot() {
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.001)), dec!(1.567));
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.01)), dec!(1.56));
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.1)), dec!(1.5));
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(1)), dec!(1));
    }

    #[test]
    fn test_round_down_zero_lot_truncates_to_eight_decimals() {
        assert_eq!(
            round_down_to_lot(dec!(0.123456789), Decimal::ZERO),
            dec!(0.12345678)
        );
    }

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(dec!(100), dec!(101)), Some(dec!(1)));
        assert_eq!(pct_change(dec!(200), dec!(190)), Some(dec!(-5)));
        assert_eq!(pct_change(Decimal::ZERO, dec!(1)), None);
    }

    #[test]
    fn test_weighted_average() {
        let values = vec![
            (dec!(100), dec!(2)), // 100 with weight 2
            (dec!(200), dec!(1)), // 200 with weight 1
        ];
        let avg = weighted_average(&values);
        assert!(avg > dec!(133) && avg < dec!(134));
        assert_eq!(weighted_average(&[]), Decimal::ZERO);
    }
}
