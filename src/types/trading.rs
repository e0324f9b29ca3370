//! Orders, positions, and trades.
//!
//! All monetary fields are `Decimal`; ids are UUID strings and timestamps are
//! epoch milliseconds. Enum wire values match the persisted column values
//! (SCREAMING_SNAKE_CASE).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The position side this order opens or adds to.
    pub fn to_position_side(self) -> PositionSide {
        match self {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order type. Limit orders are parked as PENDING; there is no matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

/// A user order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Trading symbol
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub quantity: Decimal,
    /// Limit price; overwritten with the execution price when filled
    pub price: Decimal,
    pub leverage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// Fill time (ms), set when status becomes FILLED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The order side that closes a position of this side.
    pub fn closing_order_side(self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Closed,
    Liquidated,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
            PositionStatus::Liquidated => "LIQUIDATED",
        }
    }
}

/// A leveraged position. At most one OPEN position exists per (user, symbol).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Unique position ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Trading symbol
    pub symbol: String,
    pub side: PositionSide,
    pub status: PositionStatus,
    /// Position size in base currency, > 0 while OPEN
    pub quantity: Decimal,
    /// Weighted-average entry price
    pub entry_price: Decimal,
    pub leverage: u32,
    /// Collateral reserved for the position (notional / leverage)
    pub initial_margin: Decimal,
    /// Latest mark price applied by the price processor
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    /// Realized PnL, set on close/reduce/liquidate
    pub realized_pnl: Decimal,
    pub liquidation_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// Portion of the position closed when the stop-loss fires (1-100)
    pub sl_close_percent: u32,
    /// Portion of the position closed when the take-profit fires (1-100)
    pub tp_close_percent: u32,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Position value in quote currency at the current mark.
    pub fn notional_value(&self) -> Decimal {
        self.quantity * self.mark_price
    }
}

/// The kind of position change a trade records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    Open,
    Add,
    Close,
    Liquidate,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Open => "OPEN",
            TradeType::Add => "ADD",
            TradeType::Close => "CLOSE",
            TradeType::Liquidate => "LIQUIDATE",
        }
    }
}

/// Append-only execution record. One trade is written per state-changing
/// position operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub position_id: String,
    pub order_id: String,
    pub symbol: String,
    /// Copied from the position, not the order
    pub side: PositionSide,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub quantity: Decimal,
    /// Fill price
    pub price: Decimal,
    /// Realized PnL; zero for OPEN/ADD trades
    pub pnl: Decimal,
    /// Zero-fee placeholder
    pub fee: Decimal,
    pub created_at: i64,
}

/// Trade event published to the outbound bus after every trade insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade_id: String,
    pub user_id: String,
    pub position_id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub pnl: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn to_event(&self) -> TradeEvent {
        TradeEvent {
            trade_id: self.id.clone(),
            user_id: self.user_id.clone(),
            position_id: self.position_id.clone(),
            order_id: self.order_id.clone(),
            symbol: self.symbol.clone(),
            side: self.side.as_str().to_string(),
            trade_type: self.trade_type.as_str().to_string(),
            quantity: self.quantity,
            price: self.price,
            pnl: self.pnl,
            fee: self.fee,
            timestamp: DateTime::from_timestamp_millis(self.created_at).unwrap_or_else(Utc::now),
        }
    }
}

// =============================================================================
// Request payloads
// =============================================================================

/// Request body for placing an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Limit price, required for LIMIT orders
    pub price: Option<Decimal>,
    pub leverage: u32,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

/// Request body for closing a position. Omitting quantity closes it fully.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub quantity: Option<Decimal>,
}

/// Request body for updating a position's stop-loss / take-profit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTpSlRequest {
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub sl_close_percent: Option<u32>,
    pub tp_close_percent: Option<u32>,
}
