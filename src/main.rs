use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perpsim::config::{Config, FeedMode};
use perpsim::engine::Engine;
use perpsim::feed::mock::MockFeed;
use perpsim::services::{
    AccountService, AuthService, OrderService, PositionService, PriceCache, PriceProcessor,
    SqliteStore, TradeEvents,
};
use perpsim::{api, feed, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perpsim=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!(
        symbols = ?config.supported_symbols,
        max_leverage = config.max_leverage,
        "starting perpsim on {}:{}",
        config.host,
        config.port
    );

    // Durable store and shared services
    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    let price_cache = Arc::new(PriceCache::new());
    let trade_events = Arc::new(TradeEvents::default());
    let engine = Arc::new(Engine::new(config.max_leverage, config.maintenance_rate));

    let position_service = Arc::new(PositionService::new(
        store.clone(),
        price_cache.clone(),
        engine.clone(),
        trade_events.clone(),
    ));
    let order_service = Arc::new(OrderService::new(
        store.clone(),
        price_cache.clone(),
        engine.clone(),
        position_service.clone(),
        trade_events.clone(),
        &config.supported_symbols,
    ));
    let account_service = Arc::new(AccountService::new(store.clone()));
    let auth_service = Arc::new(AuthService::new(
        store.clone(),
        config.initial_balance,
        config.session_ttl_hours,
    ));

    // Shutdown signal observed by every background task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Inbound price stream and the processor that drives the trigger loop
    let (publisher, price_rx) = feed::channel(config.price_channel_capacity);
    let processor = PriceProcessor::new(
        store.clone(),
        price_cache.clone(),
        position_service.clone(),
    );
    let processor_handle = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { processor.run(price_rx, shutdown_rx).await })
    };

    // Mock feed keeps the venue alive without an external market-data service
    let feed_handle = match config.feed_mode {
        FeedMode::Mock => {
            let mock = MockFeed::new(
                config.supported_symbols.clone(),
                Duration::from_millis(config.mock_feed_interval_ms),
                publisher.clone(),
            );
            let shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move { mock.run(shutdown_rx).await }))
        }
        FeedMode::Off => None,
    };

    // Create application state
    let state = AppState {
        config: config.clone(),
        store,
        price_cache,
        auth_service,
        order_service,
        position_service,
        account_service,
        trade_events,
        price_publisher: publisher,
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server; ctrl-c stops accepting new requests
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("perpsim listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Drain background tasks up to the configured timeout
    let _ = shutdown_tx.send(true);
    let drain = async {
        let _ = processor_handle.await;
        if let Some(handle) = feed_handle {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), drain)
        .await
        .is_err()
    {
        warn!("shutdown timeout, background tasks still running");
    }

    info!("perpsim stopped");
    Ok(())
}
