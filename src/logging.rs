//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::Error;

/// The most characters of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The largest request body, in bytes, the middleware will read.
pub const REQUEST_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The JSON fields whose values are never written to the logs.
const REDACTED_FIELDS: [&str; 2] = ["password", "token"];

const REDACTED_VALUE: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords and tokens in JSON bodies are redacted.
/// Requests with bodies over [REQUEST_BODY_LIMIT] bytes are rejected without being logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, REQUEST_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!("could not read request body: {error}");
            return Error::MalformedRequest(format!(
                "the request body could not be read, it must be at most {REQUEST_BODY_LIMIT} bytes"
            ))
            .into_response();
        }
    };

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    log_request(&parts, &display_body(&body_bytes, is_json));

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return Error::Panic(error.to_string()).into_response();
        }
    };

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("json"));
    log_response(&parts, &display_body(&body_bytes, is_json));

    Response::from_parts(parts, Body::from(body_bytes))
}

fn display_body(body: &Bytes, is_json: bool) -> String {
    if is_json && let Ok(mut json) = serde_json::from_slice::<Value>(body) {
        redact(&mut json);
        return json.to_string();
    }

    String::from_utf8_lossy(body).into_owned()
}

/// Replace the values of sensitive fields, at any depth, with a placeholder.
fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS
                    .iter()
                    .any(|redacted| key.eq_ignore_ascii_case(redacted))
                {
                    *field = Value::String(REDACTED_VALUE.to_owned());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// The first [LOG_BODY_LENGTH_LIMIT] characters of `body`, or `None` if it is short enough.
fn truncate(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!(
                "Received request: {} {}\nbody: {truncated}...",
                parts.method,
                parts.uri
            );
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        ),
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {}\nbody: {truncated}...", parts.status);
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {}\nbody: {body:?}", parts.status),
    }
}

#[cfg(test)]
mod logging_tests {
    use serde_json::json;

    use super::{LOG_BODY_LENGTH_LIMIT, display_body, truncate};

    #[test]
    fn redacts_passwords_and_tokens() {
        let body = json!({
            "email": "ada@example.com",
            "password": "Hunter2Hunter2",
            "nested": { "Token": "abc.def.ghi" }
        })
        .to_string();

        let display = display_body(&body.into(), true);

        assert!(!display.contains("Hunter2Hunter2"));
        assert!(!display.contains("abc.def.ghi"));
        assert!(display.contains("ada@example.com"));
    }

    #[test]
    fn leaves_non_json_bodies_alone() {
        let display = display_body(&"password=hunter2".into(), false);

        assert_eq!(display, "password=hunter2");
    }

    #[test]
    fn truncates_on_character_boundaries() {
        let body = "é".repeat(LOG_BODY_LENGTH_LIMIT + 1);

        let truncated = truncate(&body).expect("body should be truncated");

        assert_eq!(truncated.chars().count(), LOG_BODY_LENGTH_LIMIT);
        assert_eq!(truncate("short"), None);
    }
}
