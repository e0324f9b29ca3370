//! Price processor: drives the trigger loop from inbound ticks.
//!
//! For every tick the cache is updated first, then each open position on the
//! symbol is evaluated against the decimal mid. A fired trigger is delegated
//! to the position manager; otherwise only the mark price and unrealized PnL
//! are written back. One position failing never aborts the rest of the tick.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::engine::pnl;
use crate::engine::triggers::{self, TriggerKind};
use crate::services::{PositionService, PriceCache, SqliteStore, TradingError};
use crate::types::{Position, Price};

/// Consumes the inbound price stream and applies it to open positions.
pub struct PriceProcessor {
    store: Arc<SqliteStore>,
    price_cache: Arc<PriceCache>,
    positions: Arc<PositionService>,
}

impl PriceProcessor {
    pub fn new(
        store: Arc<SqliteStore>,
        price_cache: Arc<PriceCache>,
        positions: Arc<PositionService>,
    ) -> Self {
        Self {
            store,
            price_cache,
            positions,
        }
    }

    /// Run until the channel closes or shutdown is signalled.
    pub async fn run(&self, mut prices: mpsc::Receiver<Price>, mut shutdown: watch::Receiver<bool>) {
        info!("price processor started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("price processor stopping");
                        return;
                    }
                }
                price = prices.recv() => match price {
                    Some(price) => self.process_price(&price),
                    None => {
                        info!("price channel closed, processor stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Handle one tick: cache update, then trigger evaluation per position.
    pub fn process_price(&self, price: &Price) {
        self.price_cache.set(price.clone());

        let positions = match self.store.open_positions_by_symbol(&price.symbol) {
            Ok(positions) => positions,
            Err(e) => {
                error!(symbol = %price.symbol, error = %e, "failed to load open positions");
                return;
            }
        };

        if positions.is_empty() {
            return;
        }

        let mark_price = price.mid();

        for position in &positions {
            if let Err(e) = self.process_position(position, mark_price) {
                error!(
                    position_id = %position.id,
                    symbol = %position.symbol,
                    error = %e,
                    "failed to process position"
                );
            }
        }
    }

    fn process_position(
        &self,
        position: &Position,
        mark_price: Decimal,
    ) -> Result<(), TradingError> {
        match triggers::evaluate(position, mark_price) {
            Some(trigger) => match trigger.kind {
                TriggerKind::Liquidate => {
                    self.positions.liquidate(&position.id, trigger.price)?;
                }
                TriggerKind::StopLoss => {
                    self.positions.trigger_stop_loss(&position.id)?;
                }
                TriggerKind::TakeProfit => {
                    self.positions.trigger_take_profit(&position.id)?;
                }
            },
            None => {
                let unrealized_pnl = pnl::unrealized_pnl(
                    position.side,
                    position.quantity,
                    position.entry_price,
                    mark_price,
                );
                self.store
                    .update_position_pnl(&position.id, mark_price, unrealized_pnl)?;
            }
        }

        Ok(())
    }
}
