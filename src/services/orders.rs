//! Order admission.
//!
//! Validates the request, reserves margin against the account summary,
//! records the order, and for MARKET orders routes synchronously through the
//! position manager inside one transaction. LIMIT orders are parked as
//! PENDING for a future matcher and can only be cancelled.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::Engine;
use crate::services::{
    PositionService, PriceCache, SqliteStore, TradeEvents, TradingError,
};
use crate::types::{
    Order, OrderStatus, OrderType, PlaceOrderRequest, Position, Trade,
};

const DEFAULT_PAGE_LIMIT: u32 = 50;
const MAX_PAGE_LIMIT: u32 = 100;

/// Result of placing an order. Position and trade are set when the order
/// filled synchronously (MARKET).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderOutcome {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<Trade>,
}

/// Order admission service.
pub struct OrderService {
    store: Arc<SqliteStore>,
    price_cache: Arc<PriceCache>,
    engine: Arc<Engine>,
    positions: Arc<PositionService>,
    events: Arc<TradeEvents>,
    symbols: HashSet<String>,
}

impl OrderService {
    pub fn new(
        store: Arc<SqliteStore>,
        price_cache: Arc<PriceCache>,
        engine: Arc<Engine>,
        positions: Arc<PositionService>,
        events: Arc<TradeEvents>,
        supported_symbols: &[String],
    ) -> Self {
        Self {
            store,
            price_cache,
            engine,
            positions,
            events,
            symbols: supported_symbols.iter().cloned().collect(),
        }
    }

    /// Place an order for a user.
    pub fn place_order(
        &self,
        user_id: &str,
        request: PlaceOrderRequest,
    ) -> Result<PlaceOrderOutcome, TradingError> {
        self.validate(&request)?;

        let price = self
            .price_cache
            .get(&request.symbol)
            .ok_or_else(|| TradingError::PriceUnavailable(request.symbol.clone()))?;

        // MARKET crosses the spread; LIMIT executes at its own price
        let execution_price = match request.order_type {
            OrderType::Market => self.engine.execution_price(&price, request.side),
            OrderType::Limit => request.price.unwrap_or_default(),
        };

        let account = self
            .store
            .get_account_by_user(user_id)?
            .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
        let open_positions = self.store.open_positions_by_user(user_id)?;

        let required_margin =
            self.engine
                .required_margin(request.quantity, execution_price, request.leverage);
        let summary = account.calculate_summary(&open_positions);
        if summary.available_margin < required_margin {
            return Err(TradingError::InsufficientMargin {
                required: required_margin,
                available: summary.available_margin,
            });
        }

        let now = chrono::Utc::now().timestamp_millis();
        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            status: OrderStatus::Pending,
            quantity: request.quantity,
            price: execution_price,
            leverage: request.leverage,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            filled_at: None,
            created_at: now,
            updated_at: now,
        };

        if request.order_type == OrderType::Limit {
            self.store.in_tx(|tx| tx.create_order(&order))?;
            info!(
                order_id = %order.id,
                symbol = %order.symbol,
                price = %order.price,
                "limit order accepted"
            );
            return Ok(PlaceOrderOutcome {
                order,
                position: None,
                trade: None,
            });
        }

        // MARKET: persist, route through the position manager, and mark the
        // order filled, all in one transaction.
        let (order, position, trade) = self.store.in_tx(|tx| {
            tx.create_order(&order)?;

            let existing = tx.open_position_for_symbol(user_id, &order.symbol)?;
            let (position, trade) = match existing {
                None => self.positions.open_in_tx(tx, &order, execution_price)?,
                Some(mut position) if position.side == order.side.to_position_side() => {
                    let trade = self
                        .positions
                        .add_in_tx(tx, &mut position, &order, execution_price)?;
                    (position, trade)
                }
                Some(mut position) => {
                    let trade = self.positions.reduce_or_close_in_tx(
                        tx,
                        &mut position,
                        &order,
                        execution_price,
                    )?;
                    (position, trade)
                }
            };

            let now = chrono::Utc::now().timestamp_millis();
            order.status = OrderStatus::Filled;
            order.filled_at = Some(now);
            order.updated_at = now;
            tx.update_order(&order)?;

            Ok::<_, TradingError>((order, position, trade))
        })?;

        self.events.publish(&trade);

        Ok(PlaceOrderOutcome {
            order,
            position: Some(position),
            trade: Some(trade),
        })
    }

    /// Cancel a pending order. Ownership mismatches read as not-found.
    pub fn cancel_order(&self, user_id: &str, order_id: &str) -> Result<Order, TradingError> {
        let order = self.store.in_tx(|tx| {
            let mut order = tx
                .get_order(order_id)?
                .filter(|o| o.user_id == user_id)
                .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))?;

            if !order.can_be_cancelled() {
                return Err(TradingError::OrderNotPending(order_id.to_string()));
            }

            order.status = OrderStatus::Cancelled;
            order.updated_at = chrono::Utc::now().timestamp_millis();
            tx.update_order(&order)?;
            Ok(order)
        })?;

        info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }

    /// A single order; ownership mismatches read as not-found.
    pub fn get_order(&self, user_id: &str, order_id: &str) -> Result<Order, TradingError> {
        self.store
            .get_order(order_id)?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))
    }

    /// Orders for a user, newest first.
    pub fn get_orders(
        &self,
        user_id: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Order>, TradingError> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        Ok(self
            .store
            .orders_by_user(user_id, limit, offset.unwrap_or(0))?)
    }

    /// Pending orders for a user. Synthetic audit orders are FILLED on
    /// creation and therefore never appear here.
    pub fn get_pending_orders(&self, user_id: &str) -> Result<Vec<Order>, TradingError> {
        Ok(self.store.pending_orders_by_user(user_id)?)
    }

    fn validate(&self, request: &PlaceOrderRequest) -> Result<(), TradingError> {
        if !self.symbols.contains(&request.symbol) {
            return Err(TradingError::SymbolNotSupported(request.symbol.clone()));
        }

        if request.quantity <= Decimal::ZERO {
            return Err(TradingError::InvalidQuantity);
        }

        if !self.engine.validate_leverage(request.leverage) {
            return Err(TradingError::InvalidLeverage {
                requested: request.leverage,
                max: self.engine.max_leverage(),
            });
        }

        if request.order_type == OrderType::Limit
            && !request.price.is_some_and(|p| p > Decimal::ZERO)
        {
            return Err(TradingError::InvalidPrice);
        }

        Ok(())
    }
}
