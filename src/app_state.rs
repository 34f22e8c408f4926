//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use time::Duration;

use crate::{
    Error,
    auth::JwtKeys,
    circuit_breaker::CircuitBreakers,
    config::AppConfig,
    db::initialize,
    pagination::PaginationConfig,
    rate_limit::RateLimiter,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The keys for signing and verifying access tokens.
    pub jwt_keys: JwtKeys,

    /// How long an access token is valid for.
    pub token_duration: Duration,

    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,

    /// The config that controls how to page data.
    pub pagination_config: PaginationConfig,

    /// The circuits guarding each endpoint.
    pub circuit_breakers: CircuitBreakers,

    /// The limiter for the register and log in endpoints.
    pub auth_rate_limiter: RateLimiter,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `jwt_secret` is used to sign access tokens.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the rate limit is empty.
    pub fn new(
        db_connection: Connection,
        jwt_secret: &str,
        config: AppConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            jwt_keys: JwtKeys::new(jwt_secret),
            token_duration: config.token_duration,
            password_hash_cost: config.password_hash_cost,
            pagination_config: config.pagination,
            circuit_breakers: CircuitBreakers::new(config.circuit_breaker),
            auth_rate_limiter: RateLimiter::new(config.auth_rate_limit)?,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_keys.clone()
    }
}

impl FromRef<AppState> for CircuitBreakers {
    fn from_ref(state: &AppState) -> Self {
        state.circuit_breakers.clone()
    }
}
