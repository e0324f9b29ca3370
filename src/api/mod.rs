//! HTTP API layer: routing, authentication extraction, and error mapping.

pub mod auth;
pub mod health;
pub mod trading;

use axum::Router;
use serde::Serialize;

use crate::AppState;

/// Build the full application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api", trading::router())
        .merge(health::router())
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Error body with a machine-readable code.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
