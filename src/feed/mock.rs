//! Mock price source for running the venue without a live market-data feed.
//!
//! Emits one tick per configured symbol on each interval: a random deviation
//! of up to ±2% around a fixed base price, with a 0.1% spread split evenly
//! around the mid.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::info;

use crate::feed::PricePublisher;
use crate::types::Price;

/// Interval-driven random-walk tick generator.
pub struct MockFeed {
    symbols: Vec<String>,
    interval: Duration,
    publisher: PricePublisher,
}

impl MockFeed {
    pub fn new(symbols: Vec<String>, interval: Duration, publisher: PricePublisher) -> Self {
        Self {
            symbols,
            interval,
            publisher,
        }
    }

    /// Emit ticks until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(symbols = ?self.symbols, "mock price feed started");
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("mock price feed stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    for symbol in &self.symbols {
                        self.publisher.publish(generate_price(symbol));
                    }
                }
            }
        }
    }
}

fn base_price(symbol: &str) -> f64 {
    match symbol {
        "BTCUSDT" => 60_000.0,
        "ETHUSDT" => 3_000.0,
        "SOLUSDT" => 150.0,
        _ => 100.0,
    }
}

fn generate_price(symbol: &str) -> Price {
    let mut rng = rand::thread_rng();

    let base = base_price(symbol);
    let deviation = rng.gen_range(-0.02..0.02);
    let mid = base * (1.0 + deviation);
    let spread = mid * 0.001;

    Price {
        symbol: symbol.to_string(),
        bid: decimal_price(mid - spread / 2.0),
        ask: decimal_price(mid + spread / 2.0),
        timestamp: Utc::now(),
        source: "mock".to_string(),
    }
}

fn decimal_price(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(2)
}
