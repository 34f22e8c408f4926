//! Budget deletion endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    budget::delete_budget,
    database_id::BudgetId,
    extract::ApiPath,
};

/// The state needed for deleting a budget.
#[derive(Debug, Clone)]
pub struct DeleteBudgetState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteBudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Delete a budget. The transactions it tracked are left untouched.
pub async fn delete_budget_endpoint(
    State(state): State<DeleteBudgetState>,
    user: AuthenticatedUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_budget(budget_id, user.user_id, &connection)?;
    tracing::info!("user {} deleted budget {budget_id}", user.user_id);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod delete_budget_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        budget::BudgetResponse,
        category::Category,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_server, register_test_user},
    };

    #[tokio::test]
    async fn delete_budget_succeeds() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let category = server
            .get(endpoints::CATEGORIES)
            .authorization_bearer(&token)
            .await
            .json::<Vec<Category>>()
            .remove(0);
        let budget = server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 100,
                "categoryId": category.id,
                "month": 3,
                "year": 2025
            }))
            .await
            .json::<BudgetResponse>();
        let path = format_endpoint(endpoints::BUDGET, budget.budget.id);

        server
            .delete(&path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_requires_token() {
        let server = get_test_server();

        server
            .delete(&format_endpoint(endpoints::BUDGET, 1))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
