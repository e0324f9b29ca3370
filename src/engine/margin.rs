//! Margin arithmetic.
//!
//! Pure decimal functions, no I/O. Callers validate leverage >= 1 and
//! quantity > 0 before calling; division by a zero leverage is a caller bug.

use rust_decimal::Decimal;

use crate::types::PositionSide;

/// Collateral reserved to open a position: `quantity * price / leverage`.
pub fn initial_margin(quantity: Decimal, price: Decimal, leverage: u32) -> Decimal {
    quantity * price / Decimal::from(leverage)
}

/// Margin required at admission: the initial margin plus a maintenance-rate
/// buffer reserving room for maintenance and fees.
pub fn required_margin(
    quantity: Decimal,
    price: Decimal,
    leverage: u32,
    maintenance_rate: Decimal,
) -> Decimal {
    let margin = initial_margin(quantity, price, leverage);
    margin + margin * maintenance_rate
}

/// Price at which the position is forcibly closed.
///
/// Long:  `entry * (1 - 1/leverage + maintenance_rate)`
/// Short: `entry * (1 + 1/leverage - maintenance_rate)`
pub fn liquidation_price(
    entry_price: Decimal,
    leverage: u32,
    maintenance_rate: Decimal,
    side: PositionSide,
) -> Decimal {
    let leverage_impact = Decimal::ONE / Decimal::from(leverage);

    let factor = match side {
        // Long: a price drop triggers liquidation
        PositionSide::Long => Decimal::ONE - leverage_impact + maintenance_rate,
        // Short: a price rise triggers liquidation
        PositionSide::Short => Decimal::ONE + leverage_impact - maintenance_rate,
    };

    entry_price * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_initial_margin() {
        assert_eq!(initial_margin(dec!(0.1), dec!(50010), 10), dec!(500.1));
        assert_eq!(initial_margin(dec!(1.0), dec!(3000), 5), dec!(600));
    }

    #[test]
    fn test_required_margin_adds_buffer() {
        let required = required_margin(dec!(0.1), dec!(50010), 10, dec!(0.005));
        assert_eq!(required, dec!(500.1) + dec!(500.1) * dec!(0.005));
        assert!(required > initial_margin(dec!(0.1), dec!(50010), 10));
    }

    #[test]
    fn test_liquidation_price_long_below_entry() {
        let liq = liquidation_price(dec!(50010), 10, dec!(0.005), PositionSide::Long);
        assert_eq!(liq, dec!(45259.050));
        assert!(liq < dec!(50010));
    }

    #[test]
    fn test_liquidation_price_short_above_entry() {
        let liq = liquidation_price(dec!(3000), 5, dec!(0.005), PositionSide::Short);
        assert_eq!(liq, dec!(3585.000));
        assert!(liq > dec!(3000));
    }

    #[test]
    fn test_liquidation_price_at_one_x() {
        // 1x long: liquidation only at entry * maintenance_rate above zero
        let liq = liquidation_price(dec!(100), 1, dec!(0.005), PositionSide::Long);
        assert_eq!(liq, dec!(0.500));
    }
}
