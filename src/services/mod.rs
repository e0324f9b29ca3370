//! Venue services: persistence, caching, admission, position lifecycle,
//! account metrics, price processing, auth, and the outbound event bus.

mod account;
mod auth;
mod events;
mod orders;
mod positions;
mod price_cache;
mod price_processor;
mod store;

pub use account::AccountService;
pub use auth::{AuthError, AuthService};
pub use events::TradeEvents;
pub use orders::{OrderService, PlaceOrderOutcome};
pub use positions::PositionService;
pub use price_cache::PriceCache;
pub use price_processor::PriceProcessor;
pub use store::{SqliteStore, StoreTx};

use rust_decimal::Decimal;
use thiserror::Error;

/// Trading errors shared by order admission, the position manager, and the
/// account view. Ownership mismatches surface as the NotFound variants so a
/// record's existence is never revealed to another user.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("symbol not supported: {0}")]
    SymbolNotSupported(String),

    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("leverage {requested} outside allowed range 1..={max}")]
    InvalidLeverage { requested: u32, max: u32 },

    #[error("price must be positive")]
    InvalidPrice,

    #[error("insufficient margin: need {required}, have {available}")]
    InsufficientMargin {
        required: Decimal,
        available: Decimal,
    },

    #[error("no price available for {0}")]
    PriceUnavailable(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order is not pending: {0}")]
    OrderNotPending(String),

    #[error("position not found: {0}")]
    PositionNotFound(String),

    #[error("position is not open: {0}")]
    PositionNotOpen(String),

    #[error("account not found for user {0}")]
    AccountNotFound(String),

    #[error("invalid stop loss")]
    InvalidStopLoss,

    #[error("invalid take profit")]
    InvalidTakeProfit,

    #[error("close percent must be between 1 and 100")]
    InvalidClosePercent,

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for TradingError {
    fn from(e: rusqlite::Error) -> Self {
        TradingError::Database(e.to_string())
    }
}
