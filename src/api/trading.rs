//! Trading API.
//!
//! Orders:
//! - GET /api/orders - List orders, newest first (limit/offset)
//! - GET /api/orders/pending - List pending orders
//! - POST /api/orders - Place an order
//! - GET /api/orders/:id - Get order details
//! - DELETE /api/orders/:id - Cancel a pending order
//!
//! Positions:
//! - GET /api/positions - List open positions
//! - GET /api/positions/:id - Get position details
//! - PUT /api/positions/:id - Update stop-loss / take-profit
//! - DELETE /api/positions/:id - Close (optionally partially)
//!
//! Account and market data:
//! - GET /api/account - Account summary
//! - GET /api/trades - Trade history, newest first
//! - GET /api/prices - Latest cached quotes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::auth::Authenticated;
use crate::api::{ApiResponse, ErrorResponse};
use crate::services::{PlaceOrderOutcome, TradingError};
use crate::types::{
    AccountSummary, ClosePositionRequest, Order, PlaceOrderRequest, Position, Price, PriceView,
    Trade, UpdateTpSlRequest,
};
use crate::AppState;

/// Create trading router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Orders
        .route("/orders", get(list_orders))
        .route("/orders", post(place_order))
        .route("/orders/pending", get(list_pending_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id", delete(cancel_order))
        // Positions
        .route("/positions", get(list_positions))
        .route("/positions/:id", get(get_position))
        .route("/positions/:id", put(update_tpsl))
        .route("/positions/:id", delete(close_position))
        // Account, trades, prices
        .route("/account", get(get_account))
        .route("/trades", get(list_trades))
        .route("/prices", get(list_prices))
        .route("/prices", post(ingest_price))
}

/// Convert TradingError to HTTP response.
impl IntoResponse for TradingError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            TradingError::SymbolNotSupported(_) => (StatusCode::BAD_REQUEST, "SYMBOL_NOT_SUPPORTED"),
            TradingError::InvalidQuantity => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            TradingError::InvalidLeverage { .. } => (StatusCode::BAD_REQUEST, "INVALID_LEVERAGE"),
            TradingError::InvalidPrice => (StatusCode::BAD_REQUEST, "INVALID_PRICE"),
            TradingError::InsufficientMargin { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_MARGIN")
            }
            TradingError::PriceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PRICE_UNAVAILABLE")
            }
            TradingError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            TradingError::OrderNotPending(_) => (StatusCode::CONFLICT, "ORDER_NOT_PENDING"),
            TradingError::PositionNotFound(_) => (StatusCode::NOT_FOUND, "POSITION_NOT_FOUND"),
            TradingError::PositionNotOpen(_) => (StatusCode::CONFLICT, "POSITION_NOT_OPEN"),
            TradingError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            TradingError::InvalidStopLoss => (StatusCode::BAD_REQUEST, "INVALID_STOP_LOSS"),
            TradingError::InvalidTakeProfit => (StatusCode::BAD_REQUEST, "INVALID_TAKE_PROFIT"),
            TradingError::InvalidClosePercent => {
                (StatusCode::BAD_REQUEST, "INVALID_CLOSE_PERCENT")
            }
            TradingError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ClosePositionQuery {
    pub quantity: Option<Decimal>,
}

// =============================================================================
// Order handlers
// =============================================================================

/// POST /api/orders
async fn place_order(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Json<ApiResponse<PlaceOrderOutcome>>, TradingError> {
    let outcome = state.order_service.place_order(&auth.user_id, request)?;
    Ok(Json(ApiResponse { data: outcome }))
}

/// GET /api/orders
async fn list_orders(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>, TradingError> {
    let orders = state
        .order_service
        .get_orders(&auth.user_id, query.limit, query.offset)?;
    Ok(Json(ApiResponse { data: orders }))
}

/// GET /api/orders/pending
async fn list_pending_orders(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Order>>>, TradingError> {
    let orders = state.order_service.get_pending_orders(&auth.user_id)?;
    Ok(Json(ApiResponse { data: orders }))
}

/// GET /api/orders/:id
async fn get_order(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, TradingError> {
    let order = state.order_service.get_order(&auth.user_id, &id)?;
    Ok(Json(ApiResponse { data: order }))
}

/// DELETE /api/orders/:id
async fn cancel_order(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, TradingError> {
    let order = state.order_service.cancel_order(&auth.user_id, &id)?;
    Ok(Json(ApiResponse { data: order }))
}

// =============================================================================
// Position handlers
// =============================================================================

/// GET /api/positions
async fn list_positions(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Position>>>, TradingError> {
    let positions = state.position_service.get_positions(&auth.user_id)?;
    Ok(Json(ApiResponse { data: positions }))
}

/// GET /api/positions/:id
async fn get_position(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Position>>, TradingError> {
    let position = state.position_service.get_position(&auth.user_id, &id)?;
    Ok(Json(ApiResponse { data: position }))
}

/// PUT /api/positions/:id
async fn update_tpsl(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(request): Json<UpdateTpSlRequest>,
) -> Result<Json<ApiResponse<Position>>, TradingError> {
    let position = state
        .position_service
        .update_tpsl(&auth.user_id, &id, request)?;
    Ok(Json(ApiResponse { data: position }))
}

/// DELETE /api/positions/:id
///
/// Closes the position at the current market price. A `quantity` query
/// parameter (or body field) strictly below the position size closes only
/// that portion.
async fn close_position(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Query(query): Query<ClosePositionQuery>,
    body: Option<Json<ClosePositionRequest>>,
) -> Result<Json<ApiResponse<Trade>>, TradingError> {
    let quantity = query
        .quantity
        .or_else(|| body.and_then(|Json(request)| request.quantity));
    let trade = state
        .position_service
        .close_position(&auth.user_id, &id, quantity)?;
    Ok(Json(ApiResponse { data: trade }))
}

// =============================================================================
// Account, trade history, prices
// =============================================================================

/// GET /api/account
async fn get_account(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<AccountSummary>>, TradingError> {
    let summary = state.account_service.get_account(&auth.user_id)?;
    Ok(Json(ApiResponse { data: summary }))
}

/// GET /api/trades
async fn list_trades(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, TradingError> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(50).min(100);
    let trades = state
        .store
        .trades_by_user(&auth.user_id, limit, query.offset.unwrap_or(0))?;
    Ok(Json(ApiResponse { data: trades }))
}

/// GET /api/prices
async fn list_prices(State(state): State<AppState>) -> Json<ApiResponse<Vec<PriceView>>> {
    let mut prices: Vec<PriceView> = state
        .price_cache
        .get_all()
        .into_iter()
        .map(PriceView::from)
        .collect();
    prices.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Json(ApiResponse { data: prices })
}

/// POST /api/prices
///
/// Ingest endpoint for an external market-data feed. Bid/ask arrive as
/// binary floats and become decimals during deserialization; the tick is
/// queued for the price processor and dropped if the queue is full.
async fn ingest_price(State(state): State<AppState>, Json(price): Json<Price>) -> StatusCode {
    state.price_publisher.publish(price);
    StatusCode::ACCEPTED
}
