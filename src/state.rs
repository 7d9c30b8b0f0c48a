//! Implements the structs that hold the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rusqlite::Connection;
use time::Duration;

use crate::auth::DEFAULT_TOKEN_DURATION;

/// The signing and verification keys derived from the server's token secret.
#[derive(Clone)]
pub struct JwtKeys {
    /// The key used to sign newly issued tokens.
    pub encoding: EncodingKey,
    /// The key used to verify tokens presented by clients.
    pub decoding: DecodingKey,
}

impl JwtKeys {
    /// Derive both keys from the shared `secret` string.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The keys used for signing and verifying bearer tokens.
    pub jwt_keys: JwtKeys,
    /// The duration for which issued tokens are valid.
    pub token_duration: Duration,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState].
    pub fn new(token_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            jwt_keys: JwtKeys::from_secret(token_secret),
            token_duration: DEFAULT_TOKEN_DURATION,
            db_connection,
        }
    }
}

/// The state needed to validate bearer tokens on protected routes.
#[derive(Clone)]
pub struct AuthState {
    /// The key used to verify tokens presented by clients.
    pub decoding_key: DecodingKey,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            decoding_key: state.jwt_keys.decoding.clone(),
        }
    }
}

/// The state needed to log in a user and issue a bearer token.
#[derive(Clone)]
pub struct TokenState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
    /// The key used to sign newly issued tokens.
    pub encoding_key: EncodingKey,
    /// The duration for which issued tokens are valid.
    pub token_duration: Duration,
}

impl FromRef<AppState> for TokenState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            encoding_key: state.jwt_keys.encoding.clone(),
            token_duration: state.token_duration,
        }
    }
}

/// The state needed to register a user or resolve a token subject.
#[derive(Clone)]
pub struct UserState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed to create, list, and summarize transactions.
#[derive(Clone)]
pub struct TransactionState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}
