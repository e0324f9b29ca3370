//! Market price types.
//!
//! Prices arrive from the market-data feed as JSON with binary-float bid/ask.
//! They are converted to `Decimal` right here at the deserialization boundary
//! so that nothing downstream ever does float arithmetic on a price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A bid/ask quote for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    /// Trading symbol (e.g. "BTCUSDT")
    pub symbol: String,
    /// Best bid
    #[serde(with = "rust_decimal::serde::float")]
    pub bid: Decimal,
    /// Best ask
    #[serde(with = "rust_decimal::serde::float")]
    pub ask: Decimal,
    /// When the quote was observed
    pub timestamp: DateTime<Utc>,
    /// Feed that produced the quote
    pub source: String,
}

impl Price {
    /// Mid price, used as the mark price for open positions.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }

    /// Bid-ask spread.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// Read-only view of a cached price, as returned by the prices endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceView {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl From<Price> for PriceView {
    fn from(price: Price) -> Self {
        let mid = price.mid();
        Self {
            symbol: price.symbol,
            bid: price.bid,
            ask: price.ask,
            mid,
            timestamp: price.timestamp,
            source: price.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_and_spread() {
        let price = Price {
            symbol: "BTCUSDT".to_string(),
            bid: dec!(50000),
            ask: dec!(50010),
            timestamp: Utc::now(),
            source: "test".to_string(),
        };

        assert_eq!(price.mid(), dec!(50005));
        assert_eq!(price.spread(), dec!(10));
    }

    #[test]
    fn test_deserialize_from_float_wire_format() {
        let json = r#"{
            "symbol": "ETHUSDT",
            "bid": 3000.0,
            "ask": 3002.0,
            "timestamp": "2025-01-01T00:00:00Z",
            "source": "mock"
        }"#;

        let price: Price = serde_json::from_str(json).unwrap();
        assert_eq!(price.symbol, "ETHUSDT");
        assert_eq!(price.bid, dec!(3000));
        assert_eq!(price.ask, dec!(3002));
        assert_eq!(price.mid(), dec!(3001));
    }
}
