//! In-memory price cache: symbol -> latest bid/ask.
//!
//! Last write wins; there is no ordering across symbols. Readers always see a
//! complete quote because entries are replaced whole.

use dashmap::DashMap;

use crate::types::Price;

/// Process-local cache of the latest quote per symbol.
#[derive(Default)]
pub struct PriceCache {
    prices: DashMap<String, Price>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            prices: DashMap::new(),
        }
    }

    /// Store the latest quote for a symbol, unconditionally overwriting.
    pub fn set(&self, price: Price) {
        self.prices.insert(price.symbol.clone(), price);
    }

    /// Latest quote for a symbol, if any tick has arrived.
    pub fn get(&self, symbol: &str) -> Option<Price> {
        self.prices.get(symbol).map(|entry| entry.value().clone())
    }

    /// Snapshot of all cached quotes.
    pub fn get_all(&self) -> Vec<Price> {
        self.prices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn price(symbol: &str, bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> Price {
        Price {
            symbol: symbol.to_string(),
            bid,
            ask,
            timestamp: Utc::now(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_get_missing_symbol() {
        let cache = PriceCache::new();
        assert!(cache.get("BTCUSDT").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = PriceCache::new();
        cache.set(price("BTCUSDT", dec!(50000), dec!(50010)));
        cache.set(price("BTCUSDT", dec!(50100), dec!(50110)));

        let latest = cache.get("BTCUSDT").unwrap();
        assert_eq!(latest.bid, dec!(50100));
        assert_eq!(latest.ask, dec!(50110));
    }

    #[test]
    fn test_symbols_are_independent() {
        let cache = PriceCache::new();
        cache.set(price("BTCUSDT", dec!(50000), dec!(50010)));
        cache.set(price("ETHUSDT", dec!(3000), dec!(3002)));

        assert_eq!(cache.get("BTCUSDT").unwrap().bid, dec!(50000));
        assert_eq!(cache.get("ETHUSDT").unwrap().bid, dec!(3000));
        assert_eq!(cache.get_all().len(), 2);
    }
}
