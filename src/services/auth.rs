//! Authentication: registration, login, and bearer-token sessions.
//!
//! Registration creates the user and their cash account (with the configured
//! initial balance) in one transaction. Sessions live in memory with a TTL;
//! the durable store only ever sees the salted password hash.

use dashmap::DashMap;
use rand::Rng;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::services::SqliteStore;
use crate::types::{Account, AuthResponse, Session, User};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email must be between 3 and 255 characters and contain '@'")]
    InvalidEmail,

    #[error("password must be between 6 and 128 characters")]
    InvalidPassword,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for AuthError {
    fn from(e: rusqlite::Error) -> Self {
        AuthError::Database(e.to_string())
    }
}

/// Authentication service.
pub struct AuthService {
    store: Arc<SqliteStore>,
    /// Active sessions (token -> session)
    sessions: DashMap<String, Session>,
    initial_balance: Decimal,
    session_ttl_ms: i64,
}

impl AuthService {
    pub fn new(store: Arc<SqliteStore>, initial_balance: Decimal, session_ttl_hours: i64) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            initial_balance,
            session_ttl_ms: session_ttl_hours * 60 * 60 * 1000,
        }
    }

    /// Register a new user and create their account with the initial balance.
    pub fn register(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let email = email.trim().to_lowercase();
        validate_email(&email)?;
        validate_password(password)?;

        if self.store.get_user_by_email(&email)?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: hash_password(password),
            created_at: now,
            updated_at: now,
        };
        let account = Account {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            balance: self.initial_balance,
            created_at: now,
            updated_at: now,
        };

        self.store.in_tx(|tx| {
            tx.create_user(&user)?;
            tx.create_account(&account)?;
            Ok::<_, AuthError>(())
        })?;

        info!(user_id = %user.id, "user registered");
        Ok(self.create_session(&user.id))
    }

    /// Log in with email and password.
    pub fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let email = email.trim().to_lowercase();

        let user = self
            .store
            .get_user_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(self.create_session(&user.id))
    }

    /// Resolve a bearer token to a user id. Expired sessions are evicted.
    pub fn validate_token(&self, token: &str) -> Option<String> {
        let session = self.sessions.get(token)?;
        if session.is_expired() {
            drop(session);
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id.clone())
    }

    /// Invalidate a session.
    pub fn logout(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn create_session(&self, user_id: &str) -> AuthResponse {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        let token = hex::encode(bytes);
        let expires_at = chrono::Utc::now().timestamp_millis() + self.session_ttl_ms;

        self.sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                user_id: user_id.to_string(),
                expires_at,
            },
        );

        AuthResponse {
            user_id: user_id.to_string(),
            token,
            expires_at,
        }
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.len() < 3 || email.len() > 255 || !email.contains('@') {
        return Err(AuthError::InvalidEmail);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 6 || password.len() > 128 {
        return Err(AuthError::InvalidPassword);
    }
    Ok(())
}

/// Salted SHA-256, stored as `hex(salt)$hex(digest)`.
fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize()) == digest_hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn service() -> AuthService {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        AuthService::new(store, dec!(10000), 24)
    }

    #[test]
    fn test_register_creates_account_with_initial_balance() {
        let service = service();
        let auth = service.register("Trader@Example.com", "hunter22").unwrap();

        let user = service
            .store
            .get_user_by_email("trader@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(user.id, auth.user_id);

        let account = service.store.get_account_by_user(&user.id).unwrap().unwrap();
        assert_eq!(account.balance, dec!(10000));
    }

    #[test]
    fn test_register_duplicate_email() {
        let service = service();
        service.register("a@b.c", "secret1").unwrap();
        let err = service.register("A@B.C", "secret2").unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let service = service();
        assert!(matches!(
            service.register("no-at-sign", "secret1").unwrap_err(),
            AuthError::InvalidEmail
        ));
        assert!(matches!(
            service.register("a@b.c", "short").unwrap_err(),
            AuthError::InvalidPassword
        ));
    }

    #[test]
    fn test_login_and_token_validation() {
        let service = service();
        service.register("a@b.c", "secret1").unwrap();

        let auth = service.login("a@b.c", "secret1").unwrap();
        assert_eq!(service.validate_token(&auth.token).unwrap(), auth.user_id);

        assert!(matches!(
            service.login("a@b.c", "wrong-password").unwrap_err(),
            AuthError::InvalidCredentials
        ));
        assert!(service.validate_token("bogus").is_none());
    }

    #[test]
    fn test_expired_session_is_evicted() {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let service = AuthService::new(store, dec!(10000), 0);
        let auth = service.register("a@b.c", "secret1").unwrap();

        assert!(service.validate_token(&auth.token).is_none());
        assert!(service.sessions.get(&auth.token).is_none());
    }

    #[test]
    fn test_logout_invalidates_session() {
        let service = service();
        let auth = service.register("a@b.c", "secret1").unwrap();

        service.logout(&auth.token);
        assert!(service.validate_token(&auth.token).is_none());
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let first = hash_password("same-password");
        let second = hash_password("same-password");
        assert_ne!(first, second);
        assert!(verify_password("same-password", &first));
        assert!(verify_password("same-password", &second));
        assert!(!verify_password("other-password", &first));
    }
}
