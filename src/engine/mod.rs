//! Trading engine: pure calculators and validation over positions.
//!
//! The engine owns no state beyond the venue's risk parameters and performs
//! no I/O; services call into it and persist the results.

pub mod margin;
pub mod pnl;
pub mod triggers;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{Order, OrderSide, Position, PositionSide, PositionStatus, Price};

/// Risk parameters and calculation entry points.
#[derive(Debug, Clone)]
pub struct Engine {
    max_leverage: u32,
    maintenance_rate: Decimal,
}

impl Engine {
    pub fn new(max_leverage: u32, maintenance_rate: Decimal) -> Self {
        Self {
            max_leverage,
            maintenance_rate,
        }
    }

    pub fn maintenance_rate(&self) -> Decimal {
        self.maintenance_rate
    }

    pub fn max_leverage(&self) -> u32 {
        self.max_leverage
    }

    /// Leverage must be an integer in `[1, max_leverage]`.
    pub fn validate_leverage(&self, leverage: u32) -> bool {
        leverage >= 1 && leverage <= self.max_leverage
    }

    /// A stop-loss must sit between the liquidation price and the entry.
    /// Long: `liquidation < sl < entry`; short: `entry < sl < liquidation`.
    pub fn valid_stop_loss(
        &self,
        stop_loss: Decimal,
        entry_price: Decimal,
        liquidation_price: Decimal,
        side: PositionSide,
    ) -> bool {
        match side {
            PositionSide::Long => stop_loss < entry_price && stop_loss > liquidation_price,
            PositionSide::Short => stop_loss > entry_price && stop_loss < liquidation_price,
        }
    }

    /// A take-profit must sit on the profitable side of the entry.
    pub fn valid_take_profit(
        &self,
        take_profit: Decimal,
        entry_price: Decimal,
        side: PositionSide,
    ) -> bool {
        match side {
            PositionSide::Long => take_profit > entry_price,
            PositionSide::Short => take_profit < entry_price,
        }
    }

    /// Buy orders execute at the ask, sell orders at the bid. This bid/ask
    /// cross is the only source of spread cost in the venue.
    pub fn execution_price(&self, price: &Price, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => price.ask,
            OrderSide::Sell => price.bid,
        }
    }

    /// Margin required at admission, including the maintenance buffer.
    pub fn required_margin(&self, quantity: Decimal, price: Decimal, leverage: u32) -> Decimal {
        margin::required_margin(quantity, price, leverage, self.maintenance_rate)
    }

    /// Build a new OPEN position from a filled order.
    pub fn new_position(&self, order: &Order, entry_price: Decimal) -> Position {
        let side = order.side.to_position_side();
        let now = chrono::Utc::now().timestamp_millis();

        Position {
            id: Uuid::new_v4().to_string(),
            user_id: order.user_id.clone(),
            symbol: order.symbol.clone(),
            side,
            status: PositionStatus::Open,
            quantity: order.quantity,
            entry_price,
            leverage: order.leverage,
            initial_margin: margin::initial_margin(order.quantity, entry_price, order.leverage),
            mark_price: entry_price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            liquidation_price: margin::liquidation_price(
                entry_price,
                order.leverage,
                self.maintenance_rate,
                side,
            ),
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            sl_close_percent: 100,
            tp_close_percent: 100,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    /// Fold an add into the position: weighted-average entry, summed
    /// quantity, margin and liquidation price recomputed from the new entry.
    pub fn add_to_position(
        &self,
        position: &mut Position,
        add_quantity: Decimal,
        add_price: Decimal,
    ) {
        let new_entry = pnl::weighted_entry_price(
            position.quantity,
            position.entry_price,
            add_quantity,
            add_price,
        );
        let new_quantity = position.quantity + add_quantity;

        position.quantity = new_quantity;
        position.entry_price = new_entry;
        position.initial_margin =
            margin::initial_margin(new_quantity, new_entry, position.leverage);
        position.liquidation_price = margin::liquidation_price(
            new_entry,
            position.leverage,
            self.maintenance_rate,
            position.side,
        );
    }

    /// Refresh mark price and unrealized PnL in place.
    pub fn update_pnl(&self, position: &mut Position, mark_price: Decimal) {
        position.mark_price = mark_price;
        position.unrealized_pnl = pnl::unrealized_pnl(
            position.side,
            position.quantity,
            position.entry_price,
            mark_price,
        );
    }

    /// PnL realized by closing the whole position at the given price.
    pub fn realized_pnl(&self, position: &Position, close_price: Decimal) -> Decimal {
        pnl::unrealized_pnl(
            position.side,
            position.quantity,
            position.entry_price,
            close_price,
        )
    }

    /// Liquidation price for the position's current entry and leverage.
    pub fn liquidation_price_for(&self, position: &Position) -> Decimal {
        margin::liquidation_price(
            position.entry_price,
            position.leverage,
            self.maintenance_rate,
            position.side,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderStatus, OrderType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        Engine::new(100, dec!(0.005))
    }

    fn buy_order(quantity: Decimal, leverage: u32) -> Order {
        let now = Utc::now().timestamp_millis();
        Order {
            id: Uuid::new_v4().to_string(),
            user_id: "u".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            status: OrderStatus::Pending,
            quantity,
            price: Decimal::ZERO,
            leverage,
            stop_loss: None,
            take_profit: None,
            filled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_leverage_bounds() {
        let engine = engine();
        assert!(!engine.validate_leverage(0));
        assert!(engine.validate_leverage(1));
        assert!(engine.validate_leverage(100));
        assert!(!engine.validate_leverage(101));
    }

    #[test]
    fn test_execution_price_crosses_the_spread() {
        let engine = engine();
        let price = Price {
            symbol: "BTCUSDT".to_string(),
            bid: dec!(50000),
            ask: dec!(50010),
            timestamp: Utc::now(),
            source: "test".to_string(),
        };

        assert_eq!(engine.execution_price(&price, OrderSide::Buy), dec!(50010));
        assert_eq!(engine.execution_price(&price, OrderSide::Sell), dec!(50000));
    }

    #[test]
    fn test_new_position_computes_margin_and_liquidation() {
        let engine = engine();
        let order = buy_order(dec!(0.1), 10);
        let position = engine.new_position(&order, dec!(50010));

        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.entry_price, dec!(50010));
        assert_eq!(position.initial_margin, dec!(500.1));
        assert_eq!(position.liquidation_price, dec!(45259.050));
        assert!(position.liquidation_price < position.entry_price);
        assert_eq!(position.unrealized_pnl, Decimal::ZERO);
        assert_eq!(position.sl_close_percent, 100);
    }

    #[test]
    fn test_add_to_position_reweights_entry() {
        let engine = engine();
        let order = buy_order(dec!(0.1), 10);
        let mut position = engine.new_position(&order, dec!(50010));

        engine.add_to_position(&mut position, dec!(0.1), dec!(51010));

        assert_eq!(position.quantity, dec!(0.2));
        assert_eq!(position.entry_price, dec!(50510));
        assert_eq!(position.initial_margin, dec!(1010.2));
        assert_eq!(position.liquidation_price, dec!(45711.550));
    }

    #[test]
    fn test_stop_loss_validation_long() {
        let engine = engine();
        // entry 50010, liquidation 45259.05
        assert!(engine.valid_stop_loss(
            dec!(49000),
            dec!(50010),
            dec!(45259.05),
            PositionSide::Long
        ));
        // at or above entry: invalid
        assert!(!engine.valid_stop_loss(
            dec!(50010),
            dec!(50010),
            dec!(45259.05),
            PositionSide::Long
        ));
        // at or below liquidation: invalid
        assert!(!engine.valid_stop_loss(
            dec!(45259.05),
            dec!(50010),
            dec!(45259.05),
            PositionSide::Long
        ));
    }

    #[test]
    fn test_take_profit_validation() {
        let engine = engine();
        assert!(engine.valid_take_profit(dec!(52000), dec!(50010), PositionSide::Long));
        assert!(!engine.valid_take_profit(dec!(50010), dec!(50010), PositionSide::Long));
        assert!(engine.valid_take_profit(dec!(2900), dec!(3000), PositionSide::Short));
        assert!(!engine.valid_take_profit(dec!(3100), dec!(3000), PositionSide::Short));
    }

    #[test]
    fn test_update_pnl_only_touches_mark_and_pnl() {
        let engine = engine();
        let order = buy_order(dec!(0.1), 10);
        let mut position = engine.new_position(&order, dec!(50010));

        engine.update_pnl(&mut position, dec!(50005));

        assert_eq!(position.mark_price, dec!(50005));
        assert_eq!(position.unrealized_pnl, dec!(-0.5));
        assert_eq!(position.quantity, dec!(0.1));
        assert_eq!(position.entry_price, dec!(50010));
        assert_eq!(position.initial_margin, dec!(500.1));
    }
}
