//! SQLite persistence for users, accounts, orders, positions, and trades.
//!
//! A single connection behind a mutex serializes all access. Multi-statement
//! mutations run through [`SqliteStore::in_tx`] so that a position change, its
//! balance delta, the audit order, and the trade record commit or roll back
//! together. Monetary columns are TEXT holding canonical decimal strings.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::types::{
    Account, Order, OrderSide, OrderStatus, OrderType, Position, PositionSide, PositionStatus,
    Trade, TradeType, User,
};

/// Durable store for all persistent entities.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Scope handed to closures running inside a transaction (and used internally
/// for plain reads). All row-level operations live here.
pub struct StoreTx<'a> {
    conn: &'a Connection,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("sqlite store initialized");
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("in-memory sqlite store initialized");
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                email         TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at    INTEGER NOT NULL,
                updated_at    INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS accounts (
                id         TEXT PRIMARY KEY,
                user_id    TEXT UNIQUE NOT NULL REFERENCES users(id),
                balance    TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orders (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                symbol      TEXT NOT NULL,
                side        TEXT NOT NULL,
                type        TEXT NOT NULL,
                status      TEXT NOT NULL,
                quantity    TEXT NOT NULL,
                price       TEXT NOT NULL,
                leverage    INTEGER NOT NULL,
                stop_loss   TEXT,
                take_profit TEXT,
                filled_at   INTEGER,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_user_created
                ON orders(user_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS positions (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL,
                symbol            TEXT NOT NULL,
                side              TEXT NOT NULL,
                status            TEXT NOT NULL,
                quantity          TEXT NOT NULL,
                entry_price       TEXT NOT NULL,
                leverage          INTEGER NOT NULL,
                initial_margin    TEXT NOT NULL,
                mark_price        TEXT NOT NULL,
                unrealized_pnl    TEXT NOT NULL,
                realized_pnl      TEXT NOT NULL,
                liquidation_price TEXT NOT NULL,
                stop_loss         TEXT,
                take_profit       TEXT,
                sl_close_percent  INTEGER NOT NULL DEFAULT 100,
                tp_close_percent  INTEGER NOT NULL DEFAULT 100,
                created_at        INTEGER NOT NULL,
                updated_at        INTEGER NOT NULL,
                closed_at         INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_positions_user_symbol_status
                ON positions(user_id, symbol, status);
            CREATE INDEX IF NOT EXISTS idx_positions_symbol_status
                ON positions(symbol, status);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_one_open_per_user_symbol
                ON positions(user_id, symbol) WHERE status = 'OPEN';

            CREATE TABLE IF NOT EXISTS trades (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                position_id TEXT NOT NULL,
                order_id    TEXT NOT NULL,
                symbol      TEXT NOT NULL,
                side        TEXT NOT NULL,
                type        TEXT NOT NULL,
                quantity    TEXT NOT NULL,
                price       TEXT NOT NULL,
                pnl         TEXT NOT NULL,
                fee         TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_user_created
                ON trades(user_id, created_at DESC);",
        )?;

        Ok(())
    }

    /// Run a closure inside a single transaction. The closure's error rolls
    /// the transaction back; commit errors surface through the same type.
    pub fn in_tx<T, E>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let out = f(&StoreTx { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    // ========== Plain reads (outside any transaction) ==========

    pub fn get_user(&self, id: &str) -> Result<Option<User>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.get_user(id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.get_user_by_email(email)
    }

    pub fn get_account_by_user(&self, user_id: &str) -> Result<Option<Account>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.get_account_by_user(user_id)
    }

    pub fn get_order(&self, id: &str) -> Result<Option<Order>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.get_order(id)
    }

    pub fn orders_by_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Order>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.orders_by_user(user_id, limit, offset)
    }

    pub fn pending_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.pending_orders_by_user(user_id)
    }

    pub fn get_position(&self, id: &str) -> Result<Option<Position>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.get_position(id)
    }

    pub fn open_positions_by_user(&self, user_id: &str) -> Result<Vec<Position>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.open_positions_by_user(user_id)
    }

    pub fn open_position_for_symbol(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Option<Position>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.open_position_for_symbol(user_id, symbol)
    }

    pub fn open_positions_by_symbol(&self, symbol: &str) -> Result<Vec<Position>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.open_positions_by_symbol(symbol)
    }

    pub fn trades_by_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Trade>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        StoreTx { conn: &conn }.trades_by_user(user_id, limit, offset)
    }

    /// Atomic PnL-only update. Touches nothing but mark price, unrealized
    /// PnL, and updated_at, and only while the row is still OPEN. Returns
    /// false when the position transitioned out of OPEN concurrently.
    pub fn update_position_pnl(
        &self,
        position_id: &str,
        mark_price: Decimal,
        unrealized_pnl: Decimal,
    ) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE positions SET mark_price = ?1, unrealized_pnl = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'OPEN'",
            params![
                mark_price.to_string(),
                unrealized_pnl.to_string(),
                chrono::Utc::now().timestamp_millis(),
                position_id,
            ],
        )?;
        Ok(changed > 0)
    }
}

impl<'a> StoreTx<'a> {
    // ========== Users ==========

    pub fn create_user(&self, user: &User) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.created_at,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, email, password_hash, created_at, updated_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, email, password_hash, created_at, updated_at
                 FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()
    }

    // ========== Accounts ==========

    pub fn create_account(&self, account: &Account) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO accounts (id, user_id, balance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.user_id,
                account.balance.to_string(),
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_account_by_user(&self, user_id: &str) -> Result<Option<Account>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, user_id, balance, created_at, updated_at
                 FROM accounts WHERE user_id = ?1",
                params![user_id],
                row_to_account,
            )
            .optional()
    }

    /// Apply a signed delta to the account balance; returns the new balance.
    pub fn credit_balance(
        &self,
        account_id: &str,
        delta: Decimal,
    ) -> Result<Decimal, rusqlite::Error> {
        let balance: Decimal = self.conn.query_row(
            "SELECT balance FROM accounts WHERE id = ?1",
            params![account_id],
            |row| get_decimal(row, 0),
        )?;

        let new_balance = balance + delta;
        self.conn.execute(
            "UPDATE accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                new_balance.to_string(),
                chrono::Utc::now().timestamp_millis(),
                account_id,
            ],
        )?;

        Ok(new_balance)
    }

    // ========== Orders ==========

    pub fn create_order(&self, order: &Order) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO orders
                (id, user_id, symbol, side, type, status, quantity, price, leverage,
                 stop_loss, take_profit, filled_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                order.id,
                order.user_id,
                order.symbol,
                order.side.as_str(),
                order.order_type.as_str(),
                order.status.as_str(),
                order.quantity.to_string(),
                order.price.to_string(),
                order.leverage,
                order.stop_loss.map(|d| d.to_string()),
                order.take_profit.map(|d| d.to_string()),
                order.filled_at,
                order.created_at,
                order.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_order(&self, order: &Order) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE orders SET status = ?1, price = ?2, filled_at = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                order.status.as_str(),
                order.price.to_string(),
                order.filled_at,
                order.updated_at,
                order.id,
            ],
        )?;
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> Result<Option<Order>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id],
                row_to_order,
            )
            .optional()
    }

    pub fn orders_by_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Order>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![user_id, limit, offset], row_to_order)?;
        rows.collect()
    }

    pub fn pending_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 AND status = 'PENDING'
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_order)?;
        rows.collect()
    }

    // ========== Positions ==========

    pub fn create_position(&self, position: &Position) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO positions
                (id, user_id, symbol, side, status, quantity, entry_price, leverage,
                 initial_margin, mark_price, unrealized_pnl, realized_pnl,
                 liquidation_price, stop_loss, take_profit, sl_close_percent,
                 tp_close_percent, created_at, updated_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20)",
            params![
                position.id,
                position.user_id,
                position.symbol,
                position.side.as_str(),
                position.status.as_str(),
                position.quantity.to_string(),
                position.entry_price.to_string(),
                position.leverage,
                position.initial_margin.to_string(),
                position.mark_price.to_string(),
                position.unrealized_pnl.to_string(),
                position.realized_pnl.to_string(),
                position.liquidation_price.to_string(),
                position.stop_loss.map(|d| d.to_string()),
                position.take_profit.map(|d| d.to_string()),
                position.sl_close_percent,
                position.tp_close_percent,
                position.created_at,
                position.updated_at,
                position.closed_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_position(&self, position: &Position) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE positions SET
                status = ?1, quantity = ?2, entry_price = ?3, initial_margin = ?4,
                mark_price = ?5, unrealized_pnl = ?6, realized_pnl = ?7,
                liquidation_price = ?8, stop_loss = ?9, take_profit = ?10,
                sl_close_percent = ?11, tp_close_percent = ?12, updated_at = ?13,
                closed_at = ?14
             WHERE id = ?15",
            params![
                position.status.as_str(),
                position.quantity.to_string(),
                position.entry_price.to_string(),
                position.initial_margin.to_string(),
                position.mark_price.to_string(),
                position.unrealized_pnl.to_string(),
                position.realized_pnl.to_string(),
                position.liquidation_price.to_string(),
                position.stop_loss.map(|d| d.to_string()),
                position.take_profit.map(|d| d.to_string()),
                position.sl_close_percent,
                position.tp_close_percent,
                position.updated_at,
                position.closed_at,
                position.id,
            ],
        )?;
        Ok(())
    }

    pub fn get_position(&self, id: &str) -> Result<Option<Position>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {POSITION_COLUMNS} FROM positions WHERE id = ?1"),
                params![id],
                row_to_position,
            )
            .optional()
    }

    pub fn open_positions_by_user(&self, user_id: &str) -> Result<Vec<Position>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions
             WHERE user_id = ?1 AND status = 'OPEN' ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_position)?;
        rows.collect()
    }

    pub fn open_position_for_symbol(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Option<Position>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {POSITION_COLUMNS} FROM positions
                     WHERE user_id = ?1 AND symbol = ?2 AND status = 'OPEN'"
                ),
                params![user_id, symbol],
                row_to_position,
            )
            .optional()
    }

    pub fn open_positions_by_symbol(&self, symbol: &str) -> Result<Vec<Position>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions
             WHERE symbol = ?1 AND status = 'OPEN' ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![symbol], row_to_position)?;
        rows.collect()
    }

    // ========== Trades ==========

    pub fn create_trade(&self, trade: &Trade) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO trades
                (id, user_id, position_id, order_id, symbol, side, type, quantity,
                 price, pnl, fee, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                trade.id,
                trade.user_id,
                trade.position_id,
                trade.order_id,
                trade.symbol,
                trade.side.as_str(),
                trade.trade_type.as_str(),
                trade.quantity.to_string(),
                trade.price.to_string(),
                trade.pnl.to_string(),
                trade.fee.to_string(),
                trade.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn trades_by_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Trade>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, position_id, order_id, symbol, side, type, quantity,
                    price, pnl, fee, created_at
             FROM trades WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![user_id, limit, offset], row_to_trade)?;
        rows.collect()
    }
}

const ORDER_COLUMNS: &str = "id, user_id, symbol, side, type, status, quantity, price, leverage, \
                             stop_loss, take_profit, filled_at, created_at, updated_at";

const POSITION_COLUMNS: &str =
    "id, user_id, symbol, side, status, quantity, entry_price, leverage, initial_margin, \
     mark_price, unrealized_pnl, realized_pnl, liquidation_price, stop_loss, take_profit, \
     sl_close_percent, tp_close_percent, created_at, updated_at, closed_at";

// ========== Row mapping ==========

fn get_decimal(row: &Row<'_>, idx: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_opt_decimal(row: &Row<'_>, idx: usize) -> Result<Option<Decimal>, rusqlite::Error> {
    let text: Option<String> = row.get(idx)?;
    match text {
        Some(text) => Decimal::from_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn column_error(idx: usize, value: &str, what: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {what}: {value}").into(),
    )
}

fn row_to_user(row: &Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn row_to_account(row: &Row<'_>) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        balance: get_decimal(row, 2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn row_to_order(row: &Row<'_>) -> Result<Order, rusqlite::Error> {
    let side: String = row.get(3)?;
    let order_type: String = row.get(4)?;
    let status: String = row.get(5)?;

    Ok(Order {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        side: match side.as_str() {
            "BUY" => OrderSide::Buy,
            "SELL" => OrderSide::Sell,
            other => return Err(column_error(3, other, "order side")),
        },
        order_type: match order_type.as_str() {
            "MARKET" => OrderType::Market,
            "LIMIT" => OrderType::Limit,
            other => return Err(column_error(4, other, "order type")),
        },
        status: match status.as_str() {
            "PENDING" => OrderStatus::Pending,
            "FILLED" => OrderStatus::Filled,
            "CANCELLED" => OrderStatus::Cancelled,
            "REJECTED" => OrderStatus::Rejected,
            other => return Err(column_error(5, other, "order status")),
        },
        quantity: get_decimal(row, 6)?,
        price: get_decimal(row, 7)?,
        leverage: row.get::<_, i64>(8)? as u32,
        stop_loss: get_opt_decimal(row, 9)?,
        take_profit: get_opt_decimal(row, 10)?,
        filled_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn row_to_position(row: &Row<'_>) -> Result<Position, rusqlite::Error> {
    let side: String = row.get(3)?;
    let status: String = row.get(4)?;

    Ok(Position {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        side: match side.as_str() {
            "LONG" => PositionSide::Long,
            "SHORT" => PositionSide::Short,
            other => return Err(column_error(3, other, "position side")),
        },
        status: match status.as_str() {
            "OPEN" => PositionStatus::Open,
            "CLOSED" => PositionStatus::Closed,
            "LIQUIDATED" => PositionStatus::Liquidated,
            other => return Err(column_error(4, other, "position status")),
        },
        quantity: get_decimal(row, 5)?,
        entry_price: get_decimal(row, 6)?,
        leverage: row.get::<_, i64>(7)? as u32,
        initial_margin: get_decimal(row, 8)?,
        mark_price: get_decimal(row, 9)?,
        unrealized_pnl: get_decimal(row, 10)?,
        realized_pnl: get_decimal(row, 11)?,
        liquidation_price: get_decimal(row, 12)?,
        stop_loss: get_opt_decimal(row, 13)?,
        take_profit: get_opt_decimal(row, 14)?,
        sl_close_percent: row.get::<_, i64>(15)? as u32,
        tp_close_percent: row.get::<_, i64>(16)? as u32,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        closed_at: row.get(19)?,
    })
}

fn row_to_trade(row: &Row<'_>) -> Result<Trade, rusqlite::Error> {
    let side: String = row.get(5)?;
    let trade_type: String = row.get(6)?;

    Ok(Trade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        position_id: row.get(2)?,
        order_id: row.get(3)?,
        symbol: row.get(4)?,
        side: match side.as_str() {
            "LONG" => PositionSide::Long,
            "SHORT" => PositionSide::Short,
            other => return Err(column_error(5, other, "position side")),
        },
        trade_type: match trade_type.as_str() {
            "OPEN" => TradeType::Open,
            "ADD" => TradeType::Add,
            "CLOSE" => TradeType::Close,
            "LIQUIDATE" => TradeType::Liquidate,
            other => return Err(column_error(6, other, "trade type")),
        },
        quantity: get_decimal(row, 7)?,
        price: get_decimal(row, 8)?,
        pnl: get_decimal(row, 9)?,
        fee: get_decimal(row, 10)?,
        created_at: row.get(11)?,
    })
}
