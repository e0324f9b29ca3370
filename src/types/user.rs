//! Users, accounts, and authentication types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Position;

/// A registered user. Users are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Unique, stored lowercased
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A user's cash account (1:1 with User). `balance` is mutated only by the
/// position manager when realized PnL is booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub user_id: String,
    /// Cash in quote currency
    pub balance: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Derived account metrics, computed at query time from the balance and the
/// user's open positions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub balance: Decimal,
    /// balance + unrealized PnL
    pub equity: Decimal,
    /// Sum of open positions' initial margin
    pub used_margin: Decimal,
    /// equity - used margin
    pub available_margin: Decimal,
    pub unrealized_pnl: Decimal,
    /// used margin / equity, 0 when equity is not positive
    pub margin_ratio: Decimal,
}

impl Account {
    /// Compute the summary over the given positions. Non-open positions are
    /// ignored so callers may pass whatever slice they have at hand.
    pub fn calculate_summary(&self, positions: &[Position]) -> AccountSummary {
        let mut unrealized_pnl = Decimal::ZERO;
        let mut used_margin = Decimal::ZERO;

        for position in positions {
            if position.is_open() {
                unrealized_pnl += position.unrealized_pnl;
                used_margin += position.initial_margin;
            }
        }

        let equity = self.balance + unrealized_pnl;
        let available_margin = equity - used_margin;
        let margin_ratio = if equity > Decimal::ZERO {
            used_margin / equity
        } else {
            Decimal::ZERO
        };

        AccountSummary {
            balance: self.balance,
            equity,
            used_margin,
            available_margin,
            unrealized_pnl,
            margin_ratio,
        }
    }
}

/// An authenticated session, held in memory with a TTL.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    /// Expiry (ms)
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() >= self.expires_at
    }
}

/// Request body for registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful register/login response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
}
