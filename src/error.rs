//! Defines the app level error type and its conversion into problem details responses.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    database_id::{BudgetId, CategoryId, TransactionId},
    problem_details::{ErrorReport, PROBLEM_JSON_CONTENT_TYPE, ProblemDetails},
    rate_limit::{RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER},
    validation::ValidationErrors,
};

/// The broad categories errors fall into.
///
/// The category decides the HTTP status code, the problem type and how loudly
/// the error is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request payload failed one or more validation rules.
    Validation,
    /// The request was well formed but breaks a rule of the domain.
    BusinessRuleViolation,
    /// The client is not authenticated.
    Unauthorized,
    /// The requested resource does not exist or belongs to another user.
    NotFound,
    /// The request clashes with existing data.
    Conflict,
    /// The client sent too many requests.
    RateLimit,
    /// A dependency is unavailable, or the circuit for an endpoint is open.
    ExternalService,
    /// Something went wrong on the server.
    Internal,
}

impl ErrorCategory {
    /// The HTTP status code for errors in this category.
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCategory::Validation | ErrorCategory::BusinessRuleViolation => {
                StatusCode::BAD_REQUEST
            }
            ErrorCategory::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::ExternalService => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short, human readable summary of the category.
    pub fn title(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "One or more validation errors occurred.",
            ErrorCategory::BusinessRuleViolation => "Business rule violation",
            ErrorCategory::Unauthorized => "Unauthorized",
            ErrorCategory::NotFound => "Resource not found",
            ErrorCategory::Conflict => "Conflict",
            ErrorCategory::RateLimit => "Too many requests",
            ErrorCategory::ExternalService => "Service unavailable",
            ErrorCategory::Internal => "An unexpected error occurred",
        }
    }

    /// A URI reference that identifies the problem type.
    pub fn type_uri(self) -> &'static str {
        match self {
            ErrorCategory::Validation | ErrorCategory::BusinessRuleViolation => {
                "https://tools.ietf.org/html/rfc9110#section-15.5.1"
            }
            ErrorCategory::Unauthorized => "https://tools.ietf.org/html/rfc9110#section-15.5.2",
            ErrorCategory::NotFound => "https://tools.ietf.org/html/rfc9110#section-15.5.5",
            ErrorCategory::Conflict => "https://tools.ietf.org/html/rfc9110#section-15.5.10",
            ErrorCategory::RateLimit => "https://tools.ietf.org/html/rfc6585#section-4",
            ErrorCategory::ExternalService => "https://tools.ietf.org/html/rfc9110#section-15.6.4",
            ErrorCategory::Internal => "https://tools.ietf.org/html/rfc9110#section-15.6.1",
        }
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The bearer token is missing, malformed, expired or belongs to a deleted user.
    #[error("the bearer token is missing or invalid")]
    InvalidToken,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// No category with the ID exists for the user.
    #[error("category {0} could not be found")]
    CategoryNotFound(CategoryId),

    /// No transaction with the ID exists for the user.
    #[error("transaction {0} could not be found")]
    TransactionNotFound(TransactionId),

    /// No budget with the ID exists for the user.
    #[error("budget {0} could not be found")]
    BudgetNotFound(BudgetId),

    /// The email is already used by another user.
    #[error("the email \"{0}\" is already registered")]
    DuplicateEmail(String),

    /// The user already has a category with this name (ignoring case).
    #[error("a category named \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// The user already has a budget for the category in that month.
    #[error("a budget for category {category_id} in {month}/{year} already exists")]
    DuplicateBudget {
        /// The category of the existing budget.
        category_id: CategoryId,
        /// The month of the existing budget.
        month: u8,
        /// The year of the existing budget.
        year: i32,
    },

    /// The category ID does not refer to a category owned by the user.
    #[error("category {0} does not exist")]
    InvalidCategory(CategoryId),

    /// Default categories cannot be deleted.
    #[error("category {0} is a default category and cannot be deleted")]
    DefaultCategoryDeletion(CategoryId),

    /// Categories that are referenced by transactions or budgets cannot be deleted.
    #[error(
        "category {category_id} is used by {transaction_count} transaction(s) and {budget_count} budget(s)"
    )]
    CategoryInUse {
        /// The category that was to be deleted.
        category_id: CategoryId,
        /// How many transactions use the category.
        transaction_count: i64,
        /// How many budgets use the category.
        budget_count: i64,
    },

    /// The request payload failed validation.
    #[error("validation failed")]
    Validation(ValidationErrors),

    /// The request body, path or query string could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The client has made too many requests in the current window.
    #[error("rate limit of {limit} requests exceeded, retry after {retry_after_seconds}s")]
    RateLimited {
        /// The number of requests allowed per window.
        limit: u32,
        /// Seconds until the window resets.
        retry_after_seconds: u64,
    },

    /// The circuit breaker for the endpoint is open.
    #[error("the circuit for {endpoint} is open, retry after {retry_after_seconds}s")]
    CircuitOpen {
        /// The endpoint path the circuit guards.
        endpoint: String,
        /// Seconds until a trial request will be let through.
        retry_after_seconds: u64,
    },

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The JSON web token could not be created.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The rate limiter could not be built or could not check a request.
    #[error("rate limiter error: {0}")]
    RateLimiter(String),

    /// A request handler panicked.
    #[error("a request handler panicked: {0}")]
    Panic(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The category the error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) | Error::MalformedRequest(_) => ErrorCategory::Validation,
            Error::InvalidCategory(_)
            | Error::DefaultCategoryDeletion(_)
            | Error::CategoryInUse { .. } => ErrorCategory::BusinessRuleViolation,
            Error::InvalidCredentials | Error::InvalidToken => ErrorCategory::Unauthorized,
            Error::NotFound
            | Error::CategoryNotFound(_)
            | Error::TransactionNotFound(_)
            | Error::BudgetNotFound(_) => ErrorCategory::NotFound,
            Error::DuplicateEmail(_)
            | Error::DuplicateCategoryName(_)
            | Error::DuplicateBudget { .. } => ErrorCategory::Conflict,
            Error::RateLimited { .. } => ErrorCategory::RateLimit,
            Error::CircuitOpen { .. } => ErrorCategory::ExternalService,
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::RateLimiter(_)
            | Error::Panic(_) => ErrorCategory::Internal,
        }
    }

    /// A stable, machine readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "INVALID_CREDENTIALS",
            Error::InvalidToken => "INVALID_TOKEN",
            Error::NotFound => "NOT_FOUND",
            Error::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            Error::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Error::BudgetNotFound(_) => "BUDGET_NOT_FOUND",
            Error::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            Error::DuplicateCategoryName(_) => "DUPLICATE_CATEGORY_NAME",
            Error::DuplicateBudget { .. } => "DUPLICATE_BUDGET",
            Error::InvalidCategory(_) => "INVALID_CATEGORY",
            Error::DefaultCategoryDeletion(_) => "DEFAULT_CATEGORY_DELETION",
            Error::CategoryInUse { .. } => "CATEGORY_IN_USE",
            Error::Validation(_) => "VALIDATION_FAILED",
            Error::MalformedRequest(_) => "MALFORMED_REQUEST",
            Error::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Error::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::RateLimiter(_)
            | Error::Panic(_) => "INTERNAL_ERROR",
        }
    }

    /// The message shown to the client.
    ///
    /// Internal errors get a generic message so that server details are not leaked.
    fn detail(&self) -> String {
        match self {
            Error::InvalidCredentials => "Invalid email or password.".to_owned(),
            Error::InvalidToken => {
                "Authentication is required. Log in again to get a new token.".to_owned()
            }
            Error::Validation(_) => "See the errors property for details.".to_owned(),
            Error::RateLimited {
                retry_after_seconds,
                ..
            } => format!("Too many requests. Try again in {retry_after_seconds} seconds."),
            Error::CircuitOpen {
                retry_after_seconds,
                ..
            } => format!(
                "The service is temporarily unavailable. Try again in {retry_after_seconds} seconds."
            ),
            error if error.category() == ErrorCategory::Internal => {
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            error => {
                let mut message = error.to_string();

                if let Some(first) = message.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }

                message.push('.');
                message
            }
        }
    }

    /// Extra information about the error that the client can act on.
    fn context(&self) -> Option<serde_json::Value> {
        match self {
            Error::CategoryNotFound(id) | Error::InvalidCategory(id) => {
                Some(json!({ "categoryId": id }))
            }
            Error::DefaultCategoryDeletion(id) => Some(json!({ "categoryId": id })),
            Error::TransactionNotFound(id) => Some(json!({ "transactionId": id })),
            Error::BudgetNotFound(id) => Some(json!({ "budgetId": id })),
            Error::DuplicateEmail(email) => Some(json!({ "email": email })),
            Error::DuplicateCategoryName(name) => Some(json!({ "name": name })),
            Error::DuplicateBudget {
                category_id,
                month,
                year,
            } => Some(json!({ "categoryId": category_id, "month": month, "year": year })),
            Error::CategoryInUse {
                category_id,
                transaction_count,
                budget_count,
            } => Some(json!({
                "categoryId": category_id,
                "transactionCount": transaction_count,
                "budgetCount": budget_count,
            })),
            Error::RateLimited {
                limit,
                retry_after_seconds,
            } => Some(json!({ "limit": limit, "retryAfterSeconds": retry_after_seconds })),
            Error::CircuitOpen {
                endpoint,
                retry_after_seconds,
            } => Some(json!({ "endpoint": endpoint, "retryAfterSeconds": retry_after_seconds })),
            _ => None,
        }
    }

    /// Build the problem details body for the error.
    ///
    /// The trace ID is left empty, it is filled in by
    /// [problem_details_middleware](crate::problem_details::problem_details_middleware).
    pub fn to_problem_details(&self) -> ProblemDetails {
        let category = self.category();

        ProblemDetails {
            type_uri: category.type_uri().to_owned(),
            title: category.title().to_owned(),
            status: category.status_code().as_u16(),
            detail: self.detail(),
            trace_id: String::new(),
            error_code: self.code().to_owned(),
            errors: match self {
                Error::Validation(errors) => Some(errors.as_map().clone()),
                _ => None,
            },
            context: self.context(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let problem = self.to_problem_details();
        let status = self.category().status_code();

        let mut response = Response::new(Body::from(problem.to_json_bytes()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_JSON_CONTENT_TYPE),
        );

        match &self {
            Error::RateLimited {
                limit,
                retry_after_seconds,
            } => {
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
                headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(*limit));
                headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0));
                headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from(*retry_after_seconds));
            }
            Error::CircuitOpen {
                retry_after_seconds,
                ..
            } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
            }
            _ => {}
        }

        response.extensions_mut().insert(ErrorReport {
            problem,
            category: self.category(),
            message: self.to_string(),
        });

        response
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{
        http::{StatusCode, header},
        response::IntoResponse,
    };

    use crate::{
        Error,
        problem_details::{ErrorReport, ProblemDetails},
        validation::ValidationErrors,
    };

    async fn parse_problem(response: axum::response::Response) -> ProblemDetails {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Could not read response body");

        serde_json::from_slice(&body).expect("Could not parse problem details")
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let response = Error::CategoryNotFound(7).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let problem = parse_problem(response).await;
        assert_eq!(problem.status, 404);
        assert_eq!(problem.error_code, "CATEGORY_NOT_FOUND");
        assert_eq!(problem.detail, "Category 7 could not be found.");
        assert_eq!(problem.context, Some(serde_json::json!({"categoryId": 7})));
    }

    #[tokio::test]
    async fn validation_errors_are_listed() {
        let mut errors = ValidationErrors::new();
        errors.add("amount", "Amount must be greater than zero.");

        let response = Error::Validation(errors).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let problem = parse_problem(response).await;
        let errors = problem.errors.expect("errors should be set");
        assert_eq!(
            errors["amount"],
            vec!["Amount must be greater than zero.".to_owned()]
        );
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let response = Error::HashingError("bcrypt exploded".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report missing")
            .clone();
        assert!(report.message.contains("bcrypt exploded"));

        let problem = parse_problem(response).await;
        assert!(!problem.detail.contains("bcrypt"));
        assert_eq!(problem.error_code, "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn rate_limit_sets_headers() {
        let response = Error::RateLimited {
            limit: 10,
            retry_after_seconds: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "42");
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "10");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(headers.get("x-ratelimit-reset").unwrap(), "42");
    }

    #[tokio::test]
    async fn conflict_and_business_rules_map_to_their_status() {
        assert_eq!(
            Error::DuplicateEmail("a@b.c".to_owned())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::DefaultCategoryDeletion(1).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::CircuitOpen {
                endpoint: "/api/budgets".to_owned(),
                retry_after_seconds: 3
            }
            .into_response()
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
