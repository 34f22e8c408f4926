//! Transaction creation endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    extract::ApiJson,
    transaction::{Transaction, TransactionForm, create_transaction},
};

/// The state needed for creating a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Record a new income or expense for the user.
///
/// Expenses are added to the budget for their category and month, if any.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    user: AuthenticatedUser,
    ApiJson(form): ApiJson<TransactionForm>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let data = form.validate(OffsetDateTime::now_utc().date())?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = create_transaction(user.user_id, &data, &connection)?;
    tracing::info!(
        "user {} created {} transaction {}",
        user.user_id,
        transaction.transaction_type,
        transaction.id
    );

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[cfg(test)]
mod create_transaction_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use time::{Duration, OffsetDateTime, macros::date};

    use crate::{
        category::Category,
        endpoints,
        problem_details::ProblemDetails,
        test_utils::{get_test_server, register_test_user},
        transaction::{Transaction, TransactionType},
    };

    async fn first_category(server: &axum_test::TestServer, token: &str) -> Category {
        server
            .get(endpoints::CATEGORIES)
            .authorization_bearer(token)
            .await
            .json::<Vec<Category>>()
            .remove(0)
    }

    #[tokio::test]
    async fn create_transaction_succeeds() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let category = first_category(&server, &token).await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 12.345,
                "description": "  Power bill ",
                "date": "2025-03-14",
                "type": "Expense",
                "categoryId": category.id,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let transaction = response.json::<Transaction>();
        assert_eq!(transaction.amount, 12.35);
        assert_eq!(transaction.description, "Power bill");
        assert_eq!(transaction.date, date!(2025 - 03 - 14));
        assert_eq!(transaction.transaction_type, TransactionType::Expense);
        assert_eq!(transaction.category_name, category.name);
        assert_eq!(transaction.category_color, category.color);
    }

    #[tokio::test]
    async fn future_date_is_rejected() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let category = first_category(&server, &token).await;
        let tomorrow = OffsetDateTime::now_utc().date() + Duration::days(1);

        let response = server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 10,
                "description": "Time travel",
                "date": tomorrow.to_string(),
                "type": "Expense",
                "categoryId": category.id,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let errors = response
            .json::<ProblemDetails>()
            .errors
            .expect("errors should be set");
        assert!(errors.contains_key("date"));
    }

    #[tokio::test]
    async fn amount_below_one_cent_is_rejected() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let category = first_category(&server, &token).await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 0.004,
                "description": "Rounding error",
                "date": "2025-03-14",
                "type": "Expense",
                "categoryId": category.id,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let problem = response.json::<ProblemDetails>();
        assert_eq!(problem.error_code, "VALIDATION_FAILED");
        let errors = problem.errors.expect("errors should be set");
        assert!(errors.contains_key("amount"));
    }

    #[tokio::test]
    async fn category_of_other_user_is_invalid() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let other_token = register_test_user(&server, "bob@example.com").await;
        let category = first_category(&server, &other_token).await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 10,
                "description": "Not mine",
                "date": "2025-03-14",
                "type": "Income",
                "categoryId": category.id,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let problem = response.json::<ProblemDetails>();
        assert_eq!(problem.error_code, "INVALID_CATEGORY");
        assert_eq!(problem.context, Some(json!({ "categoryId": category.id })));
    }

    #[tokio::test]
    async fn unknown_type_is_malformed() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let category = first_category(&server, &token).await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 10,
                "description": "Gift",
                "date": "2025-03-14",
                "type": "Transfer",
                "categoryId": category.id,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<ProblemDetails>().error_code,
            "MALFORMED_REQUEST"
        );
    }
}
