use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;

/// Source of inbound price ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Built-in random-walk generator (default; this is a simulation venue)
    Mock,
    /// No internal source; ticks only arrive if something feeds the channel
    Off,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database path.
    pub database_path: String,
    /// Symbols accepted by order admission and emitted by the mock feed.
    pub supported_symbols: Vec<String>,
    /// Maximum order leverage.
    pub max_leverage: u32,
    /// Maintenance margin rate used in liquidation pricing (e.g. 0.005).
    pub maintenance_rate: Decimal,
    /// Account balance granted at registration.
    pub initial_balance: Decimal,
    /// Capacity of the bounded inbound price channel.
    pub price_channel_capacity: usize,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
    /// How long to wait for background tasks on shutdown.
    pub shutdown_timeout_secs: u64,
    /// Price feed mode.
    pub feed_mode: FeedMode,
    /// Tick interval for the mock feed (ms).
    pub mock_feed_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8081),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "perpsim.db".to_string()),
            supported_symbols: env::var("SUPPORTED_SYMBOLS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    vec![
                        "BTCUSDT".to_string(),
                        "ETHUSDT".to_string(),
                        "SOLUSDT".to_string(),
                    ]
                }),
            max_leverage: env::var("MAX_LEVERAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            maintenance_rate: env::var("MAINTENANCE_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(dec!(0.005)),
            initial_balance: env::var("INITIAL_BALANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(dec!(10000)),
            price_channel_capacity: env::var("PRICE_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            feed_mode: match env::var("FEED_MODE").as_deref() {
                Ok("off") => FeedMode::Off,
                _ => FeedMode::Mock,
            },
            mock_feed_interval_ms: env::var("MOCK_FEED_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
