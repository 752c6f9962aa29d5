//! Order quantity sizing against exchange filters.
//!
//! Both entry points round down to the lot step and then check the
//! minimum quantity and minimum notional. A quantity that cannot pass the
//! filters is reported as [`Infeasible`] instead of being submitted.

use crate::exchange::SymbolFilters;
use crate::utils::decimal::round_down_to_lot;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why no valid order quantity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Infeasible {
    #[error("amount {0} is not positive")]
    NonPositiveAmount(Decimal),

    #[error("price {0} is not positive")]
    NonPositivePrice(Decimal),

    #[error("quantity {qty} below minimum {min_qty}")]
    BelowMinQty { qty: Decimal, min_qty: Decimal },

    #[error("notional {notional} below minimum {min_notional}")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },
}

/// Quantity to buy with `capital` quote units at `price`.
pub fn qty_from_capital(
    capital: Decimal,
    price: Decimal,
    filters: &SymbolFilters,
) -> Result<Decimal, Infeasible> {
    if capital <= Decimal::ZERO {
        return Err(Infeasible::NonPositiveAmount(capital));
    }
    if price <= Decimal::ZERO {
        return Err(Infeasible::NonPositivePrice(price));
    }

    let qty = round_down_to_lot(capital / price, filters.step_size);
    check_filters(qty, price, filters)
}

/// Quantity to sell out of a `balance` of the base asset.
pub fn qty_from_balance(
    balance: Decimal,
    price: Decimal,
    filters: &SymbolFilters,
) -> Result<Decimal, Infeasible> {
    if balance <= Decimal::ZERO {
        return Err(Infeasible::NonPositiveAmount(balance));
    }
    if price <= Decimal::ZERO {
        return Err(Infeasible::NonPositivePrice(price));
    }

    let qty = round_down_to_lot(balance, filters.step_size);
    check_filters(qty, price, filters)
}

fn check_filters(
    qty: Decimal,
    price: Decimal,
    filters: &SymbolFilters,
) -> Result<Decimal, Infeasible> {
    // A zero quantity is never valid, even with a zero min_qty.
    if qty <= Decimal::ZERO || qty < filters.min_qty {
        return Err(Infeasible::BelowMinQty {
            qty,
            min_qty: filters.min_qty,
        });
    }

    let notional = qty * price;
    if notional < filters.min_notional {
        return Err(Infeasible::BelowMinNotional {
            notional,
            min_notional: filters.min_notional,
        });
    }

    Ok(qty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filters(min_qty: Decimal, step_size: Decimal, min_notional: Decimal) -> SymbolFilters {
        SymbolFilters {
            min_qty,
            step_size,
            min_notional,
        }
    }

    #[test]
    fn test_capital_rounds_down_to_step() {
        let f = filters(dec!(0.01), dec!(0.01), dec!(5));
        // 100 / 3 = 33.333.. -> 33.33
        assert_eq!(qty_from_capital(dec!(100), dec!(3), &f), Ok(dec!(33.33)));
    }

    #[test]
    fn test_balance_rounds_down_to_step() {
        let f = filters(dec!(0.1), dec!(0.1), dec!(1));
        assert_eq!(qty_from_balance(dec!(12.3456), dec!(7), &f), Ok(dec!(12.3)));
    }

    #[test]
    fn test_capital_quantity_is_step_multiple_and_affordable() {
        let steps = [dec!(0.001), dec!(0.01), dec!(0.1), dec!(1), dec!(0.00001)];
        let prices = [dec!(0.0731), dec!(1.2), dec!(7.77), dec!(143.21), dec!(64000.5)];
        let capitals = [dec!(10), dec!(57.31), dec!(999.99), dec!(12345.678)];

        for &step in &steps {
            for &price in &prices {
                for &capital in &capitals {
                    let f = filters(Decimal::ZERO, step, Decimal::ZERO);
                    if let Ok(qty) = qty_from_capital(capital, price, &f) {
                        assert_eq!(qty % step, Decimal::ZERO, "{} not a multiple of {}", qty, step);
                        assert!(qty * price <= capital, "{} * {} > {}", qty, price, capital);
                    }
                }
            }
        }
    }

    #[test]
    fn test_balance_quantity_never_exceeds_balance() {
        let steps = [dec!(0.001), dec!(0.1), dec!(1)];
        let balances = [dec!(0.5), dec!(1.9999), dec!(250.123456)];

        for &step in &steps {
            for &balance in &balances {
                let f = filters(Decimal::ZERO, step, Decimal::ZERO);
                if let Ok(qty) = qty_from_balance(balance, dec!(3), &f) {
                    assert!(qty <= balance);
                    assert_eq!(qty % step, Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_below_min_qty_is_infeasible() {
        let f = filters(dec!(1), dec!(1), Decimal::ZERO);
        assert_eq!(
            qty_from_capital(dec!(5), dec!(10), &f),
            Err(Infeasible::BelowMinQty {
                qty: Decimal::ZERO,
                min_qty: dec!(1)
            })
        );
    }

    #[test]
    fn test_zero_result_is_infeasible_without_min_qty() {
        let f = filters(Decimal::ZERO, dec!(1), Decimal::ZERO);
        assert!(matches!(
            qty_from_balance(dec!(0.5), dec!(10), &f),
            Err(Infeasible::BelowMinQty { .. })
        ));
    }

    #[test]
    fn test_below_min_notional_is_infeasible() {
        let f = filters(dec!(0.01), dec!(0.01), dec!(5));
        let result = qty_from_balance(dec!(0.3), dec!(10), &f);
        assert_eq!(
            result,
            Err(Infeasible::BelowMinNotional {
                notional: dec!(3.0),
                min_notional: dec!(5)
            })
        );
    }

    #[test]
    fn test_non_positive_inputs() {
        let f = filters(Decimal::ZERO, dec!(0.01), Decimal::ZERO);
        assert_eq!(
            qty_from_capital(Decimal::ZERO, dec!(10), &f),
            Err(Infeasible::NonPositiveAmount(Decimal::ZERO))
        );
        assert_eq!(
            qty_from_balance(dec!(-1), dec!(10), &f),
            Err(Infeasible::NonPositiveAmount(dec!(-1)))
        );
        assert_eq!(
            qty_from_capital(dec!(10), Decimal::ZERO, &f),
            Err(Infeasible::NonPositivePrice(Decimal::ZERO))
        );
    }

    #[test]
    fn test_zero_step_skips_quantization() {
        let f = filters(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        // 10 / 3 truncated to 8 decimals
        assert_eq!(qty_from_capital(dec!(10), dec!(3), &f), Ok(dec!(3.33333333)));
    }
}
