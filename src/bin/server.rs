use std::{fs::OpenOptions, net::SocketAddr, process::exit, sync::Arc, time::Duration};

use axum::http::HeaderValue;
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finance_tracker::{
    AppConfig, AppState, CircuitBreakerConfig, PaginationConfig, RATE_LIMIT_PRUNE_INTERVAL,
    RateLimitConfig, build_router, graceful_shutdown, prune_rate_limiter,
};

/// The REST API server for the finance tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The address to serve the API from.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The browser origin allowed to call the API, e.g. `http://localhost:5173`.
    /// Any origin is allowed when not set.
    #[arg(long)]
    cors_origin: Option<String>,

    /// The secret used to sign access tokens.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,

    /// Consecutive server errors before an endpoint's circuit opens.
    #[arg(long, default_value_t = 5)]
    breaker_failure_threshold: u32,

    /// Seconds an open circuit waits before letting a trial request through.
    #[arg(long, default_value_t = 30)]
    breaker_open_seconds: u64,

    /// Requests a client may make to each auth endpoint in a burst.
    #[arg(long, default_value_t = 10)]
    auth_rate_limit: u32,

    /// Seconds for a client's spent auth quota to fully replenish.
    #[arg(long, default_value_t = 60)]
    auth_rate_limit_window_seconds: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr: SocketAddr = match format!("{}:{}", args.host, args.port).parse() {
        Ok(addr) => addr,
        Err(error) => {
            tracing::error!("Invalid host \"{}\": {error}", args.host);
            exit(1);
        }
    };

    let cors_origin = match args.cors_origin.as_deref().map(HeaderValue::from_str) {
        None => None,
        Some(Ok(origin)) => Some(origin),
        Some(Err(error)) => {
            tracing::error!("Invalid CORS origin: {error}");
            exit(1);
        }
    };

    let connection = match Connection::open(&args.db_path) {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not open database at {}: {error}", args.db_path);
            exit(1);
        }
    };

    let config = AppConfig {
        pagination: PaginationConfig::default(),
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: args.breaker_failure_threshold,
            open_timeout: Duration::from_secs(args.breaker_open_seconds),
        },
        auth_rate_limit: RateLimitConfig {
            max_requests: args.auth_rate_limit,
            window: Duration::from_secs(args.auth_rate_limit_window_seconds),
        },
        ..Default::default()
    };

    let state = match AppState::new(connection, &args.secret, config) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the app state: {error}");
            exit(1);
        }
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));
    tokio::spawn(prune_rate_limiter(
        state.auth_rate_limiter.clone(),
        RATE_LIMIT_PRUNE_INTERVAL,
    ));

    let router = build_router(state, cors_origin);

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
    {
        tracing::error!("Server error: {error}");
        exit(1);
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let debug_log = match OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
    {
        Ok(log_file) => Some(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(false)
                .with_writer(Arc::new(log_file))
                .with_filter(filter::LevelFilter::DEBUG),
        ),
        Err(error) => {
            eprintln!("Could not create log file, logging to stdout only: {error}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}
