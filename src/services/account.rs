//! Account view: derived metrics over the balance and open positions.

use std::sync::Arc;

use crate::services::{SqliteStore, TradingError};
use crate::types::AccountSummary;

/// Read-only account metrics, consistent at the read's snapshot of positions.
pub struct AccountService {
    store: Arc<SqliteStore>,
}

impl AccountService {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Balance, equity, used/available margin, unrealized PnL, margin ratio.
    pub fn get_account(&self, user_id: &str) -> Result<AccountSummary, TradingError> {
        let account = self
            .store
            .get_account_by_user(user_id)?
            .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
        let positions = self.store.open_positions_by_user(user_id)?;
        Ok(account.calculate_summary(&positions))
    }
}
