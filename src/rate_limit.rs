//! Throttles clients, e.g. repeated log in attempts, with a per client and path quota.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    response::IntoResponse,
};
use governor::middleware::StateInformationMiddleware;
use tower_governor::{
    GovernorError, GovernorLayer,
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::KeyExtractor,
};

use crate::Error;

/// The header with the number of requests allowed per window.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
/// The header with the number of requests left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// The header with the number of seconds until another request is allowed.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// How often clients whose quota has fully replenished are forgotten.
pub const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// How many requests a client may make and over what period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// The number of requests a client may make in a burst.
    pub max_requests: u32,
    /// How long it takes for a spent quota to fully replenish.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Identifies a client by its socket address and counts each path separately.
///
/// Forwarding headers are ignored since any client can set them. Requests
/// without connection info, such as in tests, share the unspecified address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientPathKeyExtractor;

impl KeyExtractor for ClientPathKeyExtractor {
    type Key = (IpAddr, String);

    fn name(&self) -> &'static str {
        "client address and path"
    }

    fn extract<T>(&self, request: &Request<T>) -> Result<Self::Key, GovernorError> {
        let address = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| address.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        Ok((address, request.uri().path().to_owned()))
    }

    fn key_name(&self, (address, path): &Self::Key) -> Option<String> {
        Some(format!("{address} {path}"))
    }
}

type LimiterConfig = GovernorConfig<ClientPathKeyExtractor, StateInformationMiddleware>;

/// The layer that applies a [RateLimiter] to a router.
pub type RateLimitLayer =
    GovernorLayer<ClientPathKeyExtractor, StateInformationMiddleware, Body>;

/// A keyed rate limiter shared by clones.
///
/// Each client gets a burst of [RateLimitConfig::max_requests] requests per
/// path, and one request is given back every `window / max_requests`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: Arc<LimiterConfig>,
    limit: u32,
}

impl RateLimiter {
    /// Create a limiter with no recorded requests.
    ///
    /// # Errors
    ///
    /// Returns [Error::RateLimiter] if `config` allows no requests or has an empty window.
    pub fn new(config: RateLimitConfig) -> Result<Self, Error> {
        if config.max_requests == 0 || config.window.is_zero() {
            return Err(Error::RateLimiter(format!(
                "a rate limit must allow at least one request over a non-empty window, got {} requests per {:?}",
                config.max_requests, config.window
            )));
        }

        let period = (config.window / config.max_requests).max(Duration::from_nanos(1));
        let governor_config = GovernorConfigBuilder::default()
            .key_extractor(ClientPathKeyExtractor)
            .period(period)
            .burst_size(config.max_requests)
            .use_headers()
            .finish()
            .ok_or_else(|| Error::RateLimiter(format!("invalid rate limit {config:?}")))?;

        Ok(Self {
            config: Arc::new(governor_config),
            limit: config.max_requests,
        })
    }

    /// A layer that responds with a 429 problem once a client has used up its quota.
    ///
    /// Allowed responses carry the `x-ratelimit-limit` and `x-ratelimit-remaining` headers.
    pub fn layer(&self) -> RateLimitLayer {
        let limit = self.limit;

        GovernorLayer::new(Arc::clone(&self.config))
            .error_handler(move |error| rate_limit_error_response(error, limit))
    }

    /// Forget clients whose quota has fully replenished.
    pub fn prune(&self) {
        let limiter = self.config.limiter();
        limiter.retain_recent();
        limiter.shrink_to_fit();
    }

    /// The number of clients currently being tracked.
    pub fn tracked_clients(&self) -> usize {
        self.config.limiter().len()
    }
}

/// Prune `limiter` every `interval`, forever.
pub async fn prune_rate_limiter(limiter: RateLimiter, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        limiter.prune();
        tracing::debug!(
            "rate limiter is tracking {} clients",
            limiter.tracked_clients()
        );
    }
}

fn rate_limit_error_response(error: GovernorError, limit: u32) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => Error::RateLimited {
            limit,
            retry_after_seconds: wait_time.max(1),
        }
        .into_response(),
        error => {
            tracing::error!("could not check the rate limit: {error}");
            Error::RateLimiter(error.to_string()).into_response()
        }
    }
}
