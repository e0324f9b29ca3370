//! PnL arithmetic.

use rust_decimal::Decimal;

use crate::types::PositionSide;

/// Unrealized PnL at the given mark price.
///
/// Long:  `quantity * (mark - entry)`
/// Short: `quantity * (entry - mark)`
pub fn unrealized_pnl(
    side: PositionSide,
    quantity: Decimal,
    entry_price: Decimal,
    mark_price: Decimal,
) -> Decimal {
    match side {
        PositionSide::Long => quantity * (mark_price - entry_price),
        PositionSide::Short => quantity * (entry_price - mark_price),
    }
}

/// Weighted-average entry price after adding to a position.
pub fn weighted_entry_price(
    old_quantity: Decimal,
    old_price: Decimal,
    add_quantity: Decimal,
    add_price: Decimal,
) -> Decimal {
    let total_quantity = old_quantity + add_quantity;
    if total_quantity.is_zero() {
        return Decimal::ZERO;
    }

    let total_value = old_quantity * old_price + add_quantity * add_price;
    total_value / total_quantity
}

/// Return on equity as a percentage: `pnl / initial_margin * 100`.
pub fn roe(pnl: Decimal, initial_margin: Decimal) -> Decimal {
    if initial_margin.is_zero() {
        return Decimal::ZERO;
    }
    pnl / initial_margin * Decimal::from(100)
}
