//! Outbound trade event bus.
//!
//! Events are published after the trade is durably committed; the ledger is
//! the source of truth, so a failed or unobserved publish is logged and never
//! retried. Subscribers that lag simply miss events.

use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{Trade, TradeEvent};

/// Broadcast bus carrying one event per inserted trade.
pub struct TradeEvents {
    tx: broadcast::Sender<TradeEvent>,
}

impl TradeEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.tx.subscribe()
    }

    /// Publish best-effort; called only after the trade's transaction has
    /// committed.
    pub fn publish(&self, trade: &Trade) {
        let event = trade.to_event();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(
                    trade_id = %trade.id,
                    symbol = %trade.symbol,
                    trade_type = trade.trade_type.as_str(),
                    receivers,
                    "trade event published"
                );
            }
            Err(_) => {
                debug!(trade_id = %trade.id, "no trade event subscribers");
            }
        }
    }
}

impl Default for TradeEvents {
    fn default() -> Self {
        Self::new(1024)
    }
}
