//! Settings for the parts of the server that can be tuned at start up.

use time::Duration;

use crate::{
    PasswordHash, circuit_breaker::CircuitBreakerConfig, pagination::PaginationConfig,
    rate_limit::RateLimitConfig,
};

/// How long an access token is valid for.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::hours(24);

/// The tunable settings of the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Page defaults and limits for paged endpoints.
    pub pagination: PaginationConfig,
    /// When endpoint circuits open and for how long.
    pub circuit_breaker: CircuitBreakerConfig,
    /// The request limit for the register and log in endpoints.
    pub auth_rate_limit: RateLimitConfig,
    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
    /// How long an access token is valid for.
    pub token_duration: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            auth_rate_limit: RateLimitConfig::default(),
            password_hash_cost: PasswordHash::DEFAULT_COST,
            token_duration: DEFAULT_TOKEN_DURATION,
        }
    }
}
