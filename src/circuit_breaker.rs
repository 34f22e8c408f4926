//! An in-process circuit breaker that stops calling endpoints that keep failing.
//!
//! Each endpoint (matched route path) has its own circuit. A circuit opens
//! after a number of consecutive 5xx responses and short-circuits requests
//! with 503 until a timeout has passed, after which a single trial request is
//! let through to decide whether to close the circuit again.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::Error;

/// When circuits open and how long they stay open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// The number of consecutive failures that opens a circuit.
    pub failure_threshold: u32,
    /// How long a circuit stays open before a trial request is allowed.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// The state of a single circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without calling the endpoint.
    Open,
    /// A single trial request is allowed through.
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    /// When the circuit last opened, or when the current trial request started.
    changed_at: Instant,
}

impl Circuit {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            changed_at: now,
        }
    }
}

/// The circuits for every endpoint, shared between clones.
#[derive(Debug, Clone)]
pub struct CircuitBreakers {
    config: CircuitBreakerConfig,
    circuits: Arc<Mutex<HashMap<String, Circuit>>>,
}

impl CircuitBreakers {
    /// Create a set of breakers where every circuit starts closed.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ask whether a request to `endpoint` may go ahead at `now`.
    ///
    /// # Errors
    ///
    /// Returns the time left until a trial request will be allowed if the
    /// circuit is open, or if another trial request is already in flight.
    pub fn try_acquire(&self, endpoint: &str, now: Instant) -> Result<(), Duration> {
        let mut circuits = self
            .circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let circuit = circuits
            .entry(endpoint.to_owned())
            .or_insert_with(|| Circuit::new(now));

        match circuit.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open | CircuitState::HalfOpen => {
                let elapsed = now.duration_since(circuit.changed_at);

                // A trial that never reported back is given up on after the timeout.
                if elapsed >= self.config.open_timeout {
                    tracing::info!("circuit for {endpoint} is half-open, allowing a trial request");
                    circuit.state = CircuitState::HalfOpen;
                    circuit.changed_at = now;
                    Ok(())
                } else {
                    Err(self.config.open_timeout - elapsed)
                }
            }
        }
    }

    /// Record that a request to `endpoint` succeeded, closing its circuit.
    pub fn record_success(&self, endpoint: &str) {
        let mut circuits = self
            .circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(circuit) = circuits.get_mut(endpoint) {
            if circuit.state != CircuitState::Closed {
                tracing::info!("circuit for {endpoint} closed");
            }

            circuit.state = CircuitState::Closed;
            circuit.consecutive_failures = 0;
        }
    }

    /// Record that a request to `endpoint` failed at `now`.
    pub fn record_failure(&self, endpoint: &str, now: Instant) {
        let mut circuits = self
            .circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let circuit = circuits
            .entry(endpoint.to_owned())
            .or_insert_with(|| Circuit::new(now));

        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);

        let should_open = circuit.state == CircuitState::HalfOpen
            || circuit.consecutive_failures >= self.config.failure_threshold;

        if should_open {
            if circuit.state != CircuitState::Open {
                tracing::warn!(
                    "circuit for {endpoint} opened after {} consecutive failure(s)",
                    circuit.consecutive_failures
                );
            }

            circuit.state = CircuitState::Open;
            circuit.changed_at = now;
        }
    }

    /// The current state of the circuit for `endpoint`.
    pub fn state(&self, endpoint: &str) -> CircuitState {
        self.circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .map(|circuit| circuit.state)
            .unwrap_or(CircuitState::Closed)
    }
}

/// Middleware that guards each route with its own circuit.
///
/// Must be added with `route_layer` so that the matched path is available.
pub async fn circuit_breaker_middleware(
    State(breakers): State<CircuitBreakers>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = match request.extensions().get::<MatchedPath>() {
        Some(matched_path) => matched_path.as_str().to_owned(),
        None => return next.run(request).await,
    };

    if let Err(retry_after) = breakers.try_acquire(&endpoint, Instant::now()) {
        return Error::CircuitOpen {
            endpoint,
            retry_after_seconds: retry_after.as_secs().max(1),
        }
        .into_response();
    }

    let response = next.run(request).await;

    if response.status().is_server_error() {
        breakers.record_failure(&endpoint, Instant::now());
    } else {
        breakers.record_success(&endpoint);
    }

    response
}
