//! The health check endpoint.

use axum::Json;
use serde::{Deserialize, Serialize};

/// The body of the health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always "ok" when the server can answer requests.
    pub status: String,
}

/// Report that the server is up.
pub async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_owned(),
    })
}
