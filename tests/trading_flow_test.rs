//! End-to-end trading flows: order admission, position lifecycle, and the
//! price-driven trigger loop, running against an in-memory store.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use perpsim::engine::Engine;
use perpsim::services::{
    AccountService, AuthService, OrderService, PositionService, PriceCache, PriceProcessor,
    SqliteStore, TradeEvents, TradingError,
};
use perpsim::types::{
    OrderSide, OrderStatus, OrderType, PlaceOrderRequest, PositionStatus, Price, TradeType,
    UpdateTpSlRequest,
};

struct Venue {
    store: Arc<SqliteStore>,
    auth: AuthService,
    orders: OrderService,
    positions: Arc<PositionService>,
    accounts: AccountService,
    processor: PriceProcessor,
    events: Arc<TradeEvents>,
}

fn venue() -> Venue {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let price_cache = Arc::new(PriceCache::new());
    let events = Arc::new(TradeEvents::new(64));
    let engine = Arc::new(Engine::new(100, dec!(0.005)));

    let positions = Arc::new(PositionService::new(
        store.clone(),
        price_cache.clone(),
        engine.clone(),
        events.clone(),
    ));
    let orders = OrderService::new(
        store.clone(),
        price_cache.clone(),
        engine.clone(),
        positions.clone(),
        events.clone(),
        &["BTCUSDT".to_string(), "ETHUSDT".to_string()],
    );
    let accounts = AccountService::new(store.clone());
    let auth = AuthService::new(store.clone(), dec!(10000), 24);
    let processor = PriceProcessor::new(store.clone(), price_cache, positions.clone());

    Venue {
        store,
        auth,
        orders,
        positions,
        accounts,
        processor,
        events,
    }
}

impl Venue {
    fn register(&self, email: &str) -> String {
        self.auth.register(email, "password1").unwrap().user_id
    }

    /// Push one tick through the processor: cache update + trigger loop.
    fn tick(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.processor.process_price(&Price {
            symbol: symbol.to_string(),
            bid,
            ask,
            timestamp: Utc::now(),
            source: "test".to_string(),
        });
    }

    fn balance(&self, user_id: &str) -> Decimal {
        self.store
            .get_account_by_user(user_id)
            .unwrap()
            .unwrap()
            .balance
    }

    fn market(&self, symbol: &str, side: OrderSide, quantity: Decimal, leverage: u32) -> PlaceOrderRequest {
        PlaceOrderRequest {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            leverage,
            stop_loss: None,
            take_profit: None,
        }
    }
}

// =============================================================================
// Scenario: full long cycle with spread loss
// =============================================================================

#[test]
fn test_full_long_cycle_with_spread_loss() {
    let venue = venue();
    let user = venue.register("long@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();

    let position = outcome.position.unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.entry_price, dec!(50010));
    assert_eq!(position.initial_margin, dec!(500.1));
    assert_eq!(position.liquidation_price, dec!(45259.05));

    let order = outcome.order;
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.price, dec!(50010));
    assert!(order.filled_at.is_some());

    let trade = outcome.trade.unwrap();
    assert_eq!(trade.trade_type, TradeType::Open);
    assert_eq!(trade.pnl, Decimal::ZERO);

    // Close while the market is unchanged: the spread is the whole loss
    let close = venue
        .positions
        .close_position(&user, &position.id, None)
        .unwrap();
    assert_eq!(close.trade_type, TradeType::Close);
    assert_eq!(close.price, dec!(50000));
    assert_eq!(close.pnl, dec!(-1));

    assert_eq!(venue.balance(&user), dec!(9999));

    let summary = venue.accounts.get_account(&user).unwrap();
    assert_eq!(summary.used_margin, Decimal::ZERO);
    assert_eq!(summary.equity, dec!(9999));

    let closed = venue.store.get_position(&position.id).unwrap().unwrap();
    assert_eq!(closed.status, PositionStatus::Closed);
    assert_eq!(closed.realized_pnl, dec!(-1));
    assert!(closed.closed_at.is_some());

    let trades = venue.store.trades_by_user(&user, 50, 0).unwrap();
    assert_eq!(trades.len(), 2);
}

#[test]
fn test_full_short_cycle() {
    let venue = venue();
    let user = venue.register("short@t.io");
    venue.tick("ETHUSDT", dec!(3000), dec!(3002));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("ETHUSDT", OrderSide::Sell, dec!(1.0), 5))
        .unwrap();

    let position = outcome.position.unwrap();
    assert_eq!(position.entry_price, dec!(3000));
    assert_eq!(position.initial_margin, dec!(600));
    assert_eq!(position.liquidation_price, dec!(3585));
    assert!(position.liquidation_price > position.entry_price);

    let close = venue
        .positions
        .close_position(&user, &position.id, None)
        .unwrap();
    // Short closes by buying at the ask
    assert_eq!(close.price, dec!(3002));
    assert_eq!(close.pnl, dec!(-2));
    assert_eq!(venue.balance(&user), dec!(9998));
}

#[test]
fn test_insufficient_margin_rejects_without_side_effects() {
    let venue = venue();
    let user = venue.register("poor@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let err = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(1.0), 1))
        .unwrap_err();
    assert!(matches!(err, TradingError::InsufficientMargin { .. }));

    // No order, position, or balance change may exist afterwards
    assert!(venue.orders.get_orders(&user, None, None).unwrap().is_empty());
    assert!(venue.positions.get_positions(&user).unwrap().is_empty());
    assert_eq!(venue.balance(&user), dec!(10000));
}

#[test]
fn test_add_to_position_reweights_entry() {
    let venue = venue();
    let user = venue.register("adder@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();

    venue.tick("BTCUSDT", dec!(51000), dec!(51010));
    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();

    let position = outcome.position.unwrap();
    assert_eq!(position.quantity, dec!(0.2));
    assert_eq!(position.entry_price, dec!(50510));
    assert_eq!(position.initial_margin, dec!(1010.2));
    assert_eq!(position.liquidation_price, dec!(45711.55));

    let trade = outcome.trade.unwrap();
    assert_eq!(trade.trade_type, TradeType::Add);
    assert_eq!(trade.pnl, Decimal::ZERO);

    // Still a single open position for the symbol
    assert_eq!(venue.positions.get_positions(&user).unwrap().len(), 1);
}

#[test]
fn test_liquidation_loses_exactly_initial_margin() {
    let venue = venue();
    let user = venue.register("liq@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();
    let position = outcome.position.unwrap();
    assert_eq!(position.liquidation_price, dec!(45259.05));

    // Mark (mid) crashes through the liquidation threshold
    venue.tick("BTCUSDT", dec!(45000), dec!(45010));

    let liquidated = venue.store.get_position(&position.id).unwrap().unwrap();
    assert_eq!(liquidated.status, PositionStatus::Liquidated);
    assert_eq!(liquidated.realized_pnl, dec!(-500.1));
    assert_eq!(venue.balance(&user), dec!(9499.9));

    let trades = venue.store.trades_by_user(&user, 50, 0).unwrap();
    let liquidation = trades
        .iter()
        .find(|t| t.trade_type == TradeType::Liquidate)
        .unwrap();
    // Executed at the threshold, not at the mark
    assert_eq!(liquidation.price, dec!(45259.05));
    assert_eq!(liquidation.pnl, dec!(-500.1));

    // The synthetic close order is FILLED and references the trade
    let audit = venue
        .store
        .get_order(&liquidation.order_id)
        .unwrap()
        .unwrap();
    assert_eq!(audit.status, OrderStatus::Filled);
    assert_eq!(audit.side, OrderSide::Sell);
    assert!(venue.orders.get_pending_orders(&user).unwrap().is_empty());
}

#[test]
fn test_partial_stop_loss_halves_position_and_clears_stop() {
    let venue = venue();
    let user = venue.register("sl@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.2), 10))
        .unwrap();
    let position = outcome.position.unwrap();
    assert_eq!(position.initial_margin, dec!(1000.2));

    venue
        .positions
        .update_tpsl(
            &user,
            &position.id,
            UpdateTpSlRequest {
                stop_loss: Some(dec!(49000)),
                take_profit: None,
                sl_close_percent: Some(50),
                tp_close_percent: None,
            },
        )
        .unwrap();

    venue.tick("BTCUSDT", dec!(48900), dec!(48910));

    let remaining = venue.store.get_position(&position.id).unwrap().unwrap();
    assert_eq!(remaining.status, PositionStatus::Open);
    assert_eq!(remaining.quantity, dec!(0.1));
    assert_eq!(remaining.initial_margin, dec!(500.1));
    assert_eq!(remaining.stop_loss, None);
    assert_eq!(remaining.sl_close_percent, 100);

    // Half closed at the stop price: 0.1 * (49000 - 50010) = -101
    assert_eq!(venue.balance(&user), dec!(9899));

    let trades = venue.store.trades_by_user(&user, 50, 0).unwrap();
    let closes: Vec<_> = trades
        .iter()
        .filter(|t| t.trade_type == TradeType::Close)
        .collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].quantity, dec!(0.1));
    assert_eq!(closes[0].price, dec!(49000));
    assert_eq!(closes[0].pnl, dec!(-101));

    // The cleared stop must not re-fire on the next tick
    venue.tick("BTCUSDT", dec!(48900), dec!(48910));
    let untouched = venue.store.get_position(&position.id).unwrap().unwrap();
    assert_eq!(untouched.quantity, dec!(0.1));
    assert_eq!(untouched.status, PositionStatus::Open);
}

#[test]
fn test_take_profit_full_close_on_short() {
    let venue = venue();
    let user = venue.register("tp@t.io");
    venue.tick("ETHUSDT", dec!(3000), dec!(3002));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("ETHUSDT", OrderSide::Sell, dec!(1.0), 5))
        .unwrap();
    let position = outcome.position.unwrap();

    venue
        .positions
        .update_tpsl(
            &user,
            &position.id,
            UpdateTpSlRequest {
                stop_loss: None,
                take_profit: Some(dec!(2900)),
                sl_close_percent: None,
                tp_close_percent: None,
            },
        )
        .unwrap();

    venue.tick("ETHUSDT", dec!(2890), dec!(2892));

    let closed = venue.store.get_position(&position.id).unwrap().unwrap();
    assert_eq!(closed.status, PositionStatus::Closed);
    // Closed at the take-profit threshold: 1.0 * (3000 - 2900) = 100
    assert_eq!(closed.realized_pnl, dec!(100));
    assert_eq!(venue.balance(&user), dec!(10100));
}

// =============================================================================
// Opposite-side orders
// =============================================================================

#[test]
fn test_opposite_order_reduces_position() {
    let venue = venue();
    let user = venue.register("reducer@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.2), 10))
        .unwrap();

    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Sell, dec!(0.05), 10))
        .unwrap();

    let position = outcome.position.unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.quantity, dec!(0.15));

    let trade = outcome.trade.unwrap();
    assert_eq!(trade.trade_type, TradeType::Close);
    assert_eq!(trade.quantity, dec!(0.05));
    // Sold at bid: 0.05 * (50000 - 50010) = -0.5
    assert_eq!(trade.pnl, dec!(-0.5));
    assert_eq!(venue.balance(&user), dec!(9999.5));
}

#[test]
fn test_overfill_closes_and_discards_excess() {
    let venue = venue();
    let user = venue.register("overfill@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();

    // Sell five times the position: full close, no flip
    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Sell, dec!(0.5), 10))
        .unwrap();

    let position = outcome.position.unwrap();
    assert_eq!(position.status, PositionStatus::Closed);

    let trade = outcome.trade.unwrap();
    assert_eq!(trade.quantity, dec!(0.1));

    assert!(venue.positions.get_positions(&user).unwrap().is_empty());
}

// =============================================================================
// Idempotence, re-close, and the ledger property
// =============================================================================

#[test]
fn test_re_tick_without_trigger_is_idempotent() {
    let venue = venue();
    let user = venue.register("idem@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();
    let id = outcome.position.unwrap().id;

    venue.tick("BTCUSDT", dec!(49500), dec!(49510));
    let first = venue.store.get_position(&id).unwrap().unwrap();

    venue.tick("BTCUSDT", dec!(49500), dec!(49510));
    let second = venue.store.get_position(&id).unwrap().unwrap();

    assert_eq!(first.mark_price, dec!(49505));
    assert_eq!(second.mark_price, first.mark_price);
    assert_eq!(second.unrealized_pnl, first.unrealized_pnl);
    assert_eq!(second.quantity, first.quantity);
    assert_eq!(second.entry_price, first.entry_price);
    assert_eq!(second.initial_margin, first.initial_margin);
    assert_eq!(second.status, PositionStatus::Open);
    assert_eq!(venue.balance(&user), dec!(10000));
}

#[test]
fn test_close_after_close_is_not_open() {
    let venue = venue();
    let user = venue.register("double@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();
    let id = outcome.position.unwrap().id;

    venue.positions.close_position(&user, &id, None).unwrap();
    let err = venue.positions.close_position(&user, &id, None).unwrap_err();
    assert!(matches!(err, TradingError::PositionNotOpen(_)));
}

#[test]
fn test_balance_equals_initial_plus_realized_pnl() {
    let venue = venue();
    let user = venue.register("ledger@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));
    venue.tick("ETHUSDT", dec!(3000), dec!(3002));

    // A mixed history: open, add, partial close, full close, a short cycle
    venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.2), 10))
        .unwrap();
    venue.tick("BTCUSDT", dec!(50500), dec!(50510));
    venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();
    venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Sell, dec!(0.15), 10))
        .unwrap();
    let remaining = venue
        .positions
        .get_positions(&user)
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    venue
        .positions
        .close_position(&user, &remaining.id, None)
        .unwrap();
    venue
        .orders
        .place_order(&user, venue.market("ETHUSDT", OrderSide::Sell, dec!(2), 5))
        .unwrap();
    venue.tick("ETHUSDT", dec!(2950), dec!(2952));
    let short = venue
        .positions
        .get_positions(&user)
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    venue
        .positions
        .close_position(&user, &short.id, Some(dec!(1)))
        .unwrap();

    let trades = venue.store.trades_by_user(&user, 100, 0).unwrap();
    let realized: Decimal = trades.iter().map(|t| t.pnl).sum();
    assert_eq!(venue.balance(&user), dec!(10000) + realized);

    // OPEN/ADD trades carry zero PnL
    for trade in &trades {
        if matches!(trade.trade_type, TradeType::Open | TradeType::Add) {
            assert_eq!(trade.pnl, Decimal::ZERO);
        }
    }
}

// =============================================================================
// Orders surface
// =============================================================================

#[test]
fn test_limit_order_parks_pending_and_cancels() {
    let venue = venue();
    let user = venue.register("limit@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(
            &user,
            PlaceOrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                order_type: OrderType::Limit,
                quantity: dec!(0.1),
                price: Some(dec!(48000)),
                leverage: 10,
                stop_loss: None,
                take_profit: None,
            },
        )
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Pending);
    assert!(outcome.position.is_none());
    assert!(outcome.trade.is_none());

    // Ticks do not fill limit orders
    venue.tick("BTCUSDT", dec!(47000), dec!(47010));
    let pending = venue.orders.get_pending_orders(&user).unwrap();
    assert_eq!(pending.len(), 1);

    let cancelled = venue.orders.cancel_order(&user, &outcome.order.id).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let err = venue
        .orders
        .cancel_order(&user, &outcome.order.id)
        .unwrap_err();
    assert!(matches!(err, TradingError::OrderNotPending(_)));
}

#[test]
fn test_ownership_reads_as_not_found() {
    let venue = venue();
    let owner = venue.register("owner@t.io");
    let other = venue.register("other@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    let outcome = venue
        .orders
        .place_order(&owner, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();
    let position_id = outcome.position.unwrap().id;
    let order_id = outcome.order.id;

    assert!(matches!(
        venue.orders.get_order(&other, &order_id).unwrap_err(),
        TradingError::OrderNotFound(_)
    ));
    assert!(matches!(
        venue.orders.cancel_order(&other, &order_id).unwrap_err(),
        TradingError::OrderNotFound(_)
    ));
    assert!(matches!(
        venue
            .positions
            .close_position(&other, &position_id, None)
            .unwrap_err(),
        TradingError::PositionNotFound(_)
    ));
}

#[test]
fn test_validation_errors() {
    let venue = venue();
    let user = venue.register("invalid@t.io");
    venue.tick("BTCUSDT", dec!(50000), dec!(50010));

    assert!(matches!(
        venue
            .orders
            .place_order(&user, venue.market("DOGEUSDT", OrderSide::Buy, dec!(1), 10))
            .unwrap_err(),
        TradingError::SymbolNotSupported(_)
    ));
    assert!(matches!(
        venue
            .orders
            .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0), 10))
            .unwrap_err(),
        TradingError::InvalidQuantity
    ));
    assert!(matches!(
        venue
            .orders
            .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(1), 101))
            .unwrap_err(),
        TradingError::InvalidLeverage { .. }
    ));
    assert!(matches!(
        venue
            .orders
            .place_order(&user, venue.market("ETHUSDT", OrderSide::Buy, dec!(1), 5))
            .unwrap_err(),
        TradingError::PriceUnavailable(_)
    ));

    // SL on the wrong side of entry is rejected on update
    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();
    let err = venue
        .positions
        .update_tpsl(
            &user,
            &outcome.position.unwrap().id,
            UpdateTpSlRequest {
                stop_loss: Some(dec!(51000)),
                take_profit: None,
                sl_close_percent: None,
                tp_close_percent: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, TradingError::InvalidStopLoss));
}

// =============================================================================
// Outbound trade events
// =============================================================================

#[tokio::test]
async fn test_trade_events_published_per_trade() {
    let venue = venue();
    let user = venue.register("events@t.io");
    let mut rx = venue.events.subscribe();

    venue.tick("BTCUSDT", dec!(50000), dec!(50010));
    let outcome = venue
        .orders
        .place_order(&user, venue.market("BTCUSDT", OrderSide::Buy, dec!(0.1), 10))
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.trade_type, "OPEN");
    assert_eq!(event.symbol, "BTCUSDT");

    // Liquidation publishes too
    venue.tick("BTCUSDT", dec!(45000), dec!(45010));
    let event = rx.recv().await.unwrap();
    assert_eq!(event.trade_type, "LIQUIDATE");
    assert_eq!(event.position_id, outcome.position.unwrap().id);
    assert_eq!(event.pnl, dec!(-500.1));
}
