//! Inbound price feed plumbing.
//!
//! The processor consumes a bounded channel; producers publish through a
//! cloneable handle that drops the tick (with a warning) when the channel is
//! full. Dropping is safe because each tick supersedes the previous one for
//! its symbol; only the latest bid/ask matters.

pub mod mock;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::types::Price;

/// Create the feed channel. The receiver goes to the price processor.
pub fn channel(capacity: usize) -> (PricePublisher, mpsc::Receiver<Price>) {
    let (tx, rx) = mpsc::channel(capacity);
    (PricePublisher { tx }, rx)
}

/// Producer-side handle for pushing ticks into the venue.
#[derive(Clone)]
pub struct PricePublisher {
    tx: mpsc::Sender<Price>,
}

impl PricePublisher {
    /// Publish a tick, dropping it if the processor is falling behind.
    pub fn publish(&self, price: Price) {
        match self.tx.try_send(price) {
            Ok(()) => {}
            Err(TrySendError::Full(price)) => {
                warn!(symbol = %price.symbol, "price channel full, dropping tick");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("price channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn price(symbol: &str) -> Price {
        Price {
            symbol: symbol.to_string(),
            bid: dec!(100),
            ask: dec!(101),
            timestamp: Utc::now(),
            source: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let (publisher, mut rx) = channel(8);
        publisher.publish(price("BTCUSDT"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_overflow_drops_instead_of_blocking() {
        let (publisher, mut rx) = channel(1);
        publisher.publish(price("BTCUSDT"));
        publisher.publish(price("ETHUSDT")); // dropped, capacity 1

        assert_eq!(rx.recv().await.unwrap().symbol, "BTCUSDT");
        assert!(rx.try_recv().is_err());
    }
}
