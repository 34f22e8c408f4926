//! Finance Tracker is a REST API for tracking personal income, expenses and
//! monthly budgets.
//!
//! Users register and log in to get a bearer token, then manage their
//! categories, transactions and budgets and read reports over their
//! transactions. Errors are returned as `application/problem+json` bodies.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
mod budget;
mod category;
mod circuit_breaker;
mod config;
mod database_id;
mod db;
pub mod endpoints;
mod error;
mod extract;
mod health;
mod logging;
mod pagination;
mod problem_details;
mod rate_limit;
mod report;
mod routing;
mod transaction;
mod validation;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{NewUser, PasswordHash, User, UserID, ValidatedPassword, create_user};
pub use budget::{Budget, BudgetData, create_budget};
pub use category::{Category, seed_default_categories};
pub use circuit_breaker::CircuitBreakerConfig;
pub use config::{AppConfig, DEFAULT_TOKEN_DURATION};
pub use db::initialize as initialize_db;
pub use error::{Error, ErrorCategory};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use problem_details::ProblemDetails;
pub use rate_limit::{
    RATE_LIMIT_PRUNE_INTERVAL, RateLimitConfig, RateLimiter, prune_rate_limiter,
};
pub use routing::build_router;
pub use transaction::{Transaction, TransactionData, TransactionType, create_transaction};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
