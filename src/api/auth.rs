//! Authentication API.
//!
//! Flow:
//! 1. POST /api/auth/register - Create a user + account, returns a token
//! 2. POST /api/auth/login - Exchange credentials for a token
//! 3. GET /api/auth/me - Current user (requires auth)
//! 4. POST /api/auth/logout - Invalidate the session

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::{ApiResponse, ErrorResponse};
use crate::services::AuthError;
use crate::types::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::AppState;

/// Create auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_me))
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AuthError::InvalidEmail => (StatusCode::BAD_REQUEST, "INVALID_EMAIL"),
            AuthError::InvalidPassword => (StatusCode::BAD_REQUEST, "INVALID_PASSWORD"),
            AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "USER_ALREADY_EXISTS"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AuthError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AuthError> {
    let auth = state
        .auth_service
        .register(&request.email, &request.password)?;
    Ok(Json(ApiResponse { data: auth }))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AuthError> {
    let auth = state.auth_service.login(&request.email, &request.password)?;
    Ok(Json(ApiResponse { data: auth }))
}

/// GET /api/auth/me
async fn get_me(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<User>>, AuthError> {
    let user = state
        .store
        .get_user(&auth.user_id)
        .map_err(|e| AuthError::Database(e.to_string()))?
        .ok_or(AuthError::Unauthorized)?;
    Ok(Json(ApiResponse { data: user }))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Json<ApiResponse<LogoutResponse>> {
    state.auth_service.logout(&auth.token);
    Json(ApiResponse {
        data: LogoutResponse { success: true },
    })
}

/// Logout response.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Authenticated user extractor.
///
/// Use this in route handlers to require authentication:
/// ```ignore
/// async fn my_handler(auth: Authenticated) -> impl IntoResponse {
///     let user_id = auth.user_id;
///     // ...
/// }
/// ```
pub struct Authenticated {
    pub user_id: String,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::Unauthorized)?;

        let user_id = state
            .auth_service
            .validate_token(token)
            .ok_or(AuthError::Unauthorized)?;

        Ok(Authenticated {
            user_id,
            token: token.to_string(),
        })
    }
}
