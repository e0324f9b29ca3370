//! Position lifecycle: the single writer for position rows and the single
//! caller of account balance mutation.
//!
//! Margin is virtual: opening a position never debits the balance. Only
//! realized PnL moves cash; on liquidation the realized PnL is exactly
//! `-initial_margin`. Every state-changing method writes one trade, and
//! trigger-driven closes also write a synthetic FILLED order so that every
//! trade references a real order row. All mutations for one transition run in
//! a single store transaction; the event publish happens after commit.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::Engine;
use crate::services::{PriceCache, SqliteStore, StoreTx, TradeEvents, TradingError};
use crate::types::{
    Order, OrderStatus, OrderType, Position, PositionStatus, Trade, TradeType, UpdateTpSlRequest,
};

/// Position manager.
pub struct PositionService {
    store: Arc<SqliteStore>,
    price_cache: Arc<PriceCache>,
    engine: Arc<Engine>,
    events: Arc<TradeEvents>,
}

impl PositionService {
    pub fn new(
        store: Arc<SqliteStore>,
        price_cache: Arc<PriceCache>,
        engine: Arc<Engine>,
        events: Arc<TradeEvents>,
    ) -> Self {
        Self {
            store,
            price_cache,
            engine,
            events,
        }
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// All open positions for a user.
    pub fn get_positions(&self, user_id: &str) -> Result<Vec<Position>, TradingError> {
        Ok(self.store.open_positions_by_user(user_id)?)
    }

    /// A single position; ownership mismatches read as not-found.
    pub fn get_position(&self, user_id: &str, position_id: &str) -> Result<Position, TradingError> {
        let position = self
            .store
            .get_position(position_id)?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| TradingError::PositionNotFound(position_id.to_string()))?;
        Ok(position)
    }

    // ==========================================================================
    // User-driven close
    // ==========================================================================

    /// Close a position at the current market price. A quantity strictly
    /// between zero and the position size closes that portion; anything else
    /// closes the whole position.
    pub fn close_position(
        &self,
        user_id: &str,
        position_id: &str,
        quantity: Option<Decimal>,
    ) -> Result<Trade, TradingError> {
        // Read outside the transaction only to find the symbol for the price
        // lookup; all checks re-run on the fresh row inside the transaction.
        let symbol = self
            .store
            .get_position(position_id)?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| TradingError::PositionNotFound(position_id.to_string()))?
            .symbol;

        let price = self
            .price_cache
            .get(&symbol)
            .ok_or_else(|| TradingError::PriceUnavailable(symbol.clone()))?;

        let trade = self.store.in_tx(|tx| {
            let mut position = tx
                .get_position(position_id)?
                .filter(|p| p.user_id == user_id)
                .ok_or_else(|| TradingError::PositionNotFound(position_id.to_string()))?;

            if !position.is_open() {
                return Err(TradingError::PositionNotOpen(position_id.to_string()));
            }

            // A long closes by selling at the bid, a short by buying at the ask
            let close_price = self
                .engine
                .execution_price(&price, position.side.closing_order_side());

            match quantity {
                Some(close_quantity)
                    if close_quantity > Decimal::ZERO && close_quantity < position.quantity =>
                {
                    self.reduce_in_tx(
                        tx,
                        &mut position,
                        close_quantity,
                        close_price,
                        None,
                        false,
                        false,
                        "user",
                    )
                }
                _ => self.close_full_in_tx(tx, &mut position, close_price, None, "user"),
            }
        })?;

        self.events.publish(&trade);
        Ok(trade)
    }

    // ==========================================================================
    // Stop-loss / take-profit settings
    // ==========================================================================

    /// Update a position's SL/TP thresholds and close percents, validating
    /// them against the entry and liquidation prices.
    pub fn update_tpsl(
        &self,
        user_id: &str,
        position_id: &str,
        request: UpdateTpSlRequest,
    ) -> Result<Position, TradingError> {
        self.store.in_tx(|tx| {
            let mut position = tx
                .get_position(position_id)?
                .filter(|p| p.user_id == user_id)
                .ok_or_else(|| TradingError::PositionNotFound(position_id.to_string()))?;

            if !position.is_open() {
                return Err(TradingError::PositionNotOpen(position_id.to_string()));
            }

            if let Some(stop_loss) = request.stop_loss {
                if !self.engine.valid_stop_loss(
                    stop_loss,
                    position.entry_price,
                    position.liquidation_price,
                    position.side,
                ) {
                    return Err(TradingError::InvalidStopLoss);
                }
                position.stop_loss = Some(stop_loss);
            }

            if let Some(take_profit) = request.take_profit {
                if !self
                    .engine
                    .valid_take_profit(take_profit, position.entry_price, position.side)
                {
                    return Err(TradingError::InvalidTakeProfit);
                }
                position.take_profit = Some(take_profit);
            }

            if let Some(pct) = request.sl_close_percent {
                if !(1..=100).contains(&pct) {
                    return Err(TradingError::InvalidClosePercent);
                }
                position.sl_close_percent = pct;
            }

            if let Some(pct) = request.tp_close_percent {
                if !(1..=100).contains(&pct) {
                    return Err(TradingError::InvalidClosePercent);
                }
                position.tp_close_percent = pct;
            }

            position.updated_at = chrono::Utc::now().timestamp_millis();
            tx.update_position(&position)?;

            info!(
                position_id = %position.id,
                stop_loss = ?position.stop_loss,
                take_profit = ?position.take_profit,
                "position TP/SL updated"
            );

            Ok(position)
        })
    }

    // ==========================================================================
    // Price-driven transitions (called by the price processor)
    // ==========================================================================

    /// Forcibly close the position at its liquidation threshold. The user
    /// loses exactly the initial margin, however far the mark overshot.
    pub fn liquidate(
        &self,
        position_id: &str,
        liquidation_price: Decimal,
    ) -> Result<Option<Trade>, TradingError> {
        let trade = self.store.in_tx(|tx| {
            let mut position = match tx.get_position(position_id)? {
                Some(p) if p.is_open() => p,
                _ => return Ok(None),
            };
            self.liquidate_in_tx(tx, &mut position, liquidation_price)
                .map(Some)
        })?;

        if let Some(ref trade) = trade {
            self.events.publish(trade);
        }
        Ok(trade)
    }

    /// Close the configured percentage at the stop-loss price. A partial
    /// trigger clears the stop-loss on the remainder so it cannot re-fire.
    pub fn trigger_stop_loss(&self, position_id: &str) -> Result<Option<Trade>, TradingError> {
        let trade = self.store.in_tx(|tx| {
            let mut position = match tx.get_position(position_id)? {
                Some(p) if p.is_open() => p,
                _ => return Ok(None),
            };
            let stop_loss = match position.stop_loss {
                Some(stop_loss) => stop_loss,
                None => return Ok(None),
            };

            let pct = position.sl_close_percent.clamp(1, 100);
            if pct < 100 {
                let close_quantity =
                    position.quantity * Decimal::from(pct) / Decimal::from(100u32);
                self.reduce_in_tx(
                    tx,
                    &mut position,
                    close_quantity,
                    stop_loss,
                    None,
                    true,
                    false,
                    "stop_loss",
                )
                .map(Some)
            } else {
                self.close_full_in_tx(tx, &mut position, stop_loss, None, "stop_loss")
                    .map(Some)
            }
        })?;

        if let Some(ref trade) = trade {
            self.events.publish(trade);
        }
        Ok(trade)
    }

    /// Symmetric to [`Self::trigger_stop_loss`], against the take-profit.
    pub fn trigger_take_profit(&self, position_id: &str) -> Result<Option<Trade>, TradingError> {
        let trade = self.store.in_tx(|tx| {
            let mut position = match tx.get_position(position_id)? {
                Some(p) if p.is_open() => p,
                _ => return Ok(None),
            };
            let take_profit = match position.take_profit {
                Some(take_profit) => take_profit,
                None => return Ok(None),
            };

            let pct = position.tp_close_percent.clamp(1, 100);
            if pct < 100 {
                let close_quantity =
                    position.quantity * Decimal::from(pct) / Decimal::from(100u32);
                self.reduce_in_tx(
                    tx,
                    &mut position,
                    close_quantity,
                    take_profit,
                    None,
                    false,
                    true,
                    "take_profit",
                )
                .map(Some)
            } else {
                self.close_full_in_tx(tx, &mut position, take_profit, None, "take_profit")
                    .map(Some)
            }
        })?;

        if let Some(ref trade) = trade {
            self.events.publish(trade);
        }
        Ok(trade)
    }

    // ==========================================================================
    // Transaction-scoped transitions (shared with order admission)
    // ==========================================================================

    /// Open a fresh position from a filled order.
    pub(crate) fn open_in_tx(
        &self,
        tx: &StoreTx<'_>,
        order: &Order,
        execution_price: Decimal,
    ) -> Result<(Position, Trade), TradingError> {
        let position = self.engine.new_position(order, execution_price);
        tx.create_position(&position)?;

        let trade = new_trade(
            &position,
            &order.id,
            TradeType::Open,
            order.quantity,
            execution_price,
            Decimal::ZERO,
        );
        tx.create_trade(&trade)?;

        info!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = position.side.as_str(),
            quantity = %position.quantity,
            entry_price = %execution_price,
            leverage = position.leverage,
            "position opened"
        );

        Ok((position, trade))
    }

    /// Add a same-side fill to an existing position.
    pub(crate) fn add_in_tx(
        &self,
        tx: &StoreTx<'_>,
        position: &mut Position,
        order: &Order,
        execution_price: Decimal,
    ) -> Result<Trade, TradingError> {
        self.engine
            .add_to_position(position, order.quantity, execution_price);
        let mark_price = position.mark_price;
        self.engine.update_pnl(position, mark_price);
        position.updated_at = chrono::Utc::now().timestamp_millis();
        tx.update_position(position)?;

        let trade = new_trade(
            position,
            &order.id,
            TradeType::Add,
            order.quantity,
            execution_price,
            Decimal::ZERO,
        );
        tx.create_trade(&trade)?;

        info!(
            position_id = %position.id,
            added_quantity = %order.quantity,
            new_quantity = %position.quantity,
            new_entry_price = %position.entry_price,
            "added to position"
        );

        Ok(trade)
    }

    /// Apply an opposite-side fill: close the whole position when the order
    /// quantity reaches it (excess is discarded, the position never flips),
    /// otherwise reduce by the order quantity.
    pub(crate) fn reduce_or_close_in_tx(
        &self,
        tx: &StoreTx<'_>,
        position: &mut Position,
        order: &Order,
        execution_price: Decimal,
    ) -> Result<Trade, TradingError> {
        let close_quantity = order.quantity.min(position.quantity);

        if close_quantity == position.quantity {
            self.close_full_in_tx(tx, position, execution_price, Some(&order.id), "user")
        } else {
            self.reduce_in_tx(
                tx,
                position,
                close_quantity,
                execution_price,
                Some(&order.id),
                false,
                false,
                "user",
            )
        }
    }

    /// Full close at the given price. `order_id` is the driving user order;
    /// trigger paths pass None and get a synthetic FILLED order for audit.
    fn close_full_in_tx(
        &self,
        tx: &StoreTx<'_>,
        position: &mut Position,
        close_price: Decimal,
        order_id: Option<&str>,
        reason: &str,
    ) -> Result<Trade, TradingError> {
        let pnl = self.engine.realized_pnl(position, close_price);
        let closed_quantity = position.quantity;
        let now = chrono::Utc::now().timestamp_millis();

        position.status = PositionStatus::Closed;
        position.realized_pnl = pnl;
        position.mark_price = close_price;
        position.unrealized_pnl = Decimal::ZERO;
        position.closed_at = Some(now);
        position.updated_at = now;
        tx.update_position(position)?;

        self.credit_realized_pnl(tx, position, pnl)?;

        let order_id = match order_id {
            Some(id) => id.to_string(),
            None => self
                .audit_order_in_tx(tx, position, closed_quantity, close_price)?
                .id,
        };

        let trade = new_trade(
            position,
            &order_id,
            TradeType::Close,
            closed_quantity,
            close_price,
            pnl,
        );
        tx.create_trade(&trade)?;

        info!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = position.side.as_str(),
            pnl = %pnl,
            reason,
            "position closed"
        );

        Ok(trade)
    }

    /// Partial close: pro-rated PnL credit and margin release; entry price
    /// and leverage are untouched.
    #[allow(clippy::too_many_arguments)]
    fn reduce_in_tx(
        &self,
        tx: &StoreTx<'_>,
        position: &mut Position,
        close_quantity: Decimal,
        close_price: Decimal,
        order_id: Option<&str>,
        clear_stop_loss: bool,
        clear_take_profit: bool,
        reason: &str,
    ) -> Result<Trade, TradingError> {
        let proportion = close_quantity / position.quantity;
        let pnl = self.engine.realized_pnl(position, close_price) * proportion;
        let margin_release = position.initial_margin * proportion;

        position.quantity -= close_quantity;
        position.initial_margin -= margin_release;
        position.liquidation_price = self.engine.liquidation_price_for(position);
        if clear_stop_loss {
            position.stop_loss = None;
            position.sl_close_percent = 100;
        }
        if clear_take_profit {
            position.take_profit = None;
            position.tp_close_percent = 100;
        }
        let mark_price = position.mark_price;
        self.engine.update_pnl(position, mark_price);
        position.updated_at = chrono::Utc::now().timestamp_millis();
        tx.update_position(position)?;

        self.credit_realized_pnl(tx, position, pnl)?;

        let order_id = match order_id {
            Some(id) => id.to_string(),
            None => self
                .audit_order_in_tx(tx, position, close_quantity, close_price)?
                .id,
        };

        let trade = new_trade(
            position,
            &order_id,
            TradeType::Close,
            close_quantity,
            close_price,
            pnl,
        );
        tx.create_trade(&trade)?;

        info!(
            position_id = %position.id,
            closed_quantity = %close_quantity,
            remaining_quantity = %position.quantity,
            pnl = %pnl,
            reason,
            "position partially closed"
        );

        Ok(trade)
    }

    fn liquidate_in_tx(
        &self,
        tx: &StoreTx<'_>,
        position: &mut Position,
        liquidation_price: Decimal,
    ) -> Result<Trade, TradingError> {
        // The locked margin is lost exactly, regardless of overshoot
        let pnl = -position.initial_margin;
        let closed_quantity = position.quantity;
        let now = chrono::Utc::now().timestamp_millis();

        position.status = PositionStatus::Liquidated;
        position.realized_pnl = pnl;
        position.mark_price = liquidation_price;
        position.unrealized_pnl = Decimal::ZERO;
        position.closed_at = Some(now);
        position.updated_at = now;
        tx.update_position(position)?;

        self.credit_realized_pnl(tx, position, pnl)?;

        let order = self.audit_order_in_tx(tx, position, closed_quantity, liquidation_price)?;
        let trade = new_trade(
            position,
            &order.id,
            TradeType::Liquidate,
            closed_quantity,
            liquidation_price,
            pnl,
        );
        tx.create_trade(&trade)?;

        warn!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = position.side.as_str(),
            liquidation_price = %liquidation_price,
            loss = %pnl,
            "position liquidated"
        );

        Ok(trade)
    }

    /// Balance moves by realized PnL only; margin was never debited.
    fn credit_realized_pnl(
        &self,
        tx: &StoreTx<'_>,
        position: &Position,
        pnl: Decimal,
    ) -> Result<(), TradingError> {
        let account = tx
            .get_account_by_user(&position.user_id)?
            .ok_or_else(|| TradingError::AccountNotFound(position.user_id.clone()))?;
        tx.credit_balance(&account.id, pnl)?;
        Ok(())
    }

    /// Synthetic FILLED order so every trade references a real order row.
    /// These never show up in pending-order listings.
    fn audit_order_in_tx(
        &self,
        tx: &StoreTx<'_>,
        position: &Position,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Order, TradingError> {
        let now = chrono::Utc::now().timestamp_millis();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: position.user_id.clone(),
            symbol: position.symbol.clone(),
            side: position.side.closing_order_side(),
            order_type: OrderType::Market,
            status: OrderStatus::Filled,
            quantity,
            price,
            leverage: position.leverage,
            stop_loss: None,
            take_profit: None,
            filled_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        tx.create_order(&order)?;
        Ok(order)
    }
}

fn new_trade(
    position: &Position,
    order_id: &str,
    trade_type: TradeType,
    quantity: Decimal,
    price: Decimal,
    pnl: Decimal,
) -> Trade {
    Trade {
        id: Uuid::new_v4().to_string(),
        user_id: position.user_id.clone(),
        position_id: position.id.clone(),
        order_id: order_id.to_string(),
        symbol: position.symbol.clone(),
        side: position.side,
        trade_type,
        quantity,
        price,
        pnl,
        fee: Decimal::ZERO,
        created_at: chrono::Utc::now().timestamp_millis(),
    }
}
