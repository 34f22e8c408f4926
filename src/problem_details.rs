//! The JSON error envelope returned for every failed request, and the
//! middleware that finalises and logs it.

use std::{any::Any, collections::BTreeMap};

use axum::{
    body::Body,
    extract::Request,
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{Error, error::ErrorCategory};

/// The content type of problem details bodies.
pub const PROBLEM_JSON_CONTENT_TYPE: &str = "application/problem+json";

/// The header that carries the ID of a request, used as the trace ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A machine readable description of an error, loosely following RFC 9457.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// A short summary of the problem type.
    pub title: String,
    /// The HTTP status code.
    pub status: u16,
    /// An explanation specific to this occurrence of the problem.
    pub detail: String,
    /// The ID of the request that failed, for correlating with the server logs.
    pub trace_id: String,
    /// A stable code identifying the error.
    pub error_code: String,
    /// Validation messages keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    /// Extra data about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl ProblemDetails {
    /// Serialize the problem as JSON.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|error| {
            tracing::error!("could not serialize problem details: {error}");
            br#"{"title":"An unexpected error occurred","status":500}"#.to_vec()
        })
    }
}

/// Attached to the extensions of error responses so that the middleware can
/// log the error and fill in the trace ID.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// The body sent to the client.
    pub problem: ProblemDetails,
    /// The category of the error, used to pick the log level.
    pub category: ErrorCategory,
    /// The full error message, which may contain details hidden from the client.
    pub message: String,
}

/// Fill in the trace ID of problem details responses and log the error.
///
/// 5xx errors are logged at the `error` level, authentication and rate limit
/// errors at `warn` and the remaining client errors at `info`.
pub async fn problem_details_middleware(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    log_error(&method, &path, &trace_id, &report);

    let mut problem = report.problem;
    problem.trace_id = trace_id;
    response.headers_mut().remove(header::CONTENT_LENGTH);
    *response.body_mut() = Body::from(problem.to_json_bytes());

    response
}

fn log_error(method: &Method, path: &str, trace_id: &str, report: &ErrorReport) {
    let status = report.problem.status;
    let code = &report.problem.error_code;
    let message = &report.message;

    match report.category {
        ErrorCategory::Internal | ErrorCategory::ExternalService => {
            tracing::error!(%trace_id, "{method} {path} failed with {status} {code}: {message}")
        }
        ErrorCategory::Unauthorized | ErrorCategory::RateLimit => {
            tracing::warn!(%trace_id, "{method} {path} failed with {status} {code}: {message}")
        }
        _ => tracing::info!(%trace_id, "{method} {path} failed with {status} {code}: {message}"),
    }
}

/// Turn a panic in a request handler into a 500 problem details response.
///
/// Used with [tower_http::catch_panic::CatchPanicLayer::custom].
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };

    Error::Panic(message).into_response()
}
