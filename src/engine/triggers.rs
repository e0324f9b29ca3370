//! Trigger evaluation for open positions.
//!
//! Given a position and a mark price, at most one trigger fires. Liquidation
//! dominates because it is a solvency event; stop-loss dominates take-profit
//! because when both would fire in one tick the trade has already crossed the
//! user's stop. The trigger price is the exact threshold, not the mark, so
//! realized amounts are deterministic given the thresholds.

use rust_decimal::Decimal;

use crate::types::Position;

/// Which threshold fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Liquidate,
    StopLoss,
    TakeProfit,
}

/// A fired trigger and the price the position is closed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub price: Decimal,
}

/// True when the mark has crossed the liquidation threshold.
pub fn should_liquidate(position: &Position, mark_price: Decimal) -> bool {
    if position.is_long() {
        mark_price <= position.liquidation_price
    } else {
        mark_price >= position.liquidation_price
    }
}

/// True when a stop-loss is set and the mark has crossed it.
pub fn should_trigger_stop_loss(position: &Position, mark_price: Decimal) -> bool {
    match position.stop_loss {
        Some(stop_loss) if position.is_long() => mark_price <= stop_loss,
        Some(stop_loss) => mark_price >= stop_loss,
        None => false,
    }
}

/// True when a take-profit is set and the mark has crossed it.
pub fn should_trigger_take_profit(position: &Position, mark_price: Decimal) -> bool {
    match position.take_profit {
        Some(take_profit) if position.is_long() => mark_price >= take_profit,
        Some(take_profit) => mark_price <= take_profit,
        None => false,
    }
}

/// Evaluate all triggers for a position; first match wins.
pub fn evaluate(position: &Position, mark_price: Decimal) -> Option<Trigger> {
    if should_liquidate(position, mark_price) {
        return Some(Trigger {
            kind: TriggerKind::Liquidate,
            price: position.liquidation_price,
        });
    }

    if let Some(stop_loss) = position.stop_loss {
        if should_trigger_stop_loss(position, mark_price) {
            return Some(Trigger {
                kind: TriggerKind::StopLoss,
                price: stop_loss,
            });
        }
    }

    if let Some(take_profit) = position.take_profit {
        if should_trigger_take_profit(position, mark_price) {
            return Some(Trigger {
                kind: TriggerKind::TakeProfit,
                price: take_profit,
            });
        }
    }

    None
}
