//! Perpsim - simulated perpetual-futures trading venue.
//!
//! Accepts authenticated orders on a configured symbol set, maintains
//! leveraged long/short positions against a live bid/ask feed, and closes
//! positions autonomously when stop-loss, take-profit, or liquidation
//! thresholds are crossed. Fills happen at the current bid/ask; there is no
//! order book.

pub mod api;
pub mod config;
pub mod engine;
pub mod feed;
pub mod services;
pub mod types;

use std::sync::Arc;

use config::Config;
use feed::PricePublisher;
use services::{
    AccountService, AuthService, OrderService, PositionService, PriceCache, SqliteStore,
    TradeEvents,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub price_cache: Arc<PriceCache>,
    pub auth_service: Arc<AuthService>,
    pub order_service: Arc<OrderService>,
    pub position_service: Arc<PositionService>,
    pub account_service: Arc<AccountService>,
    pub trade_events: Arc<TradeEvents>,
    pub price_publisher: PricePublisher,
}
