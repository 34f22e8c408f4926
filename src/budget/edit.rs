//! Budget update endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    budget::{BudgetForm, BudgetResponse, update_budget},
    database_id::BudgetId,
    extract::{ApiJson, ApiPath},
};

/// The state needed for updating a budget.
#[derive(Debug, Clone)]
pub struct UpdateBudgetState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateBudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Replace the amount, category and period of a budget.
pub async fn update_budget_endpoint(
    State(state): State<UpdateBudgetState>,
    user: AuthenticatedUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(form): ApiJson<BudgetForm>,
) -> Result<Json<BudgetResponse>, Error> {
    let data = form.validate()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let budget = update_budget(budget_id, user.user_id, &data, &connection)?;
    tracing::info!("user {} updated budget {budget_id}", user.user_id);

    Ok(Json(budget.into()))
}

#[cfg(test)]
mod update_budget_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        budget::BudgetResponse,
        category::Category,
        endpoints::{self, format_endpoint},
        problem_details::ProblemDetails,
        test_utils::{get_test_server, register_test_user},
    };

    #[tokio::test]
    async fn moving_budget_recomputes_spent_amount() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let categories = server
            .get(endpoints::CATEGORIES)
            .authorization_bearer(&token)
            .await
            .json::<Vec<Category>>();
        server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 80,
                "description": "Bus pass",
                "date": "2025-04-02",
                "type": "Expense",
                "categoryId": categories[1].id,
            }))
            .await
            .assert_status(StatusCode::CREATED);
        let budget = server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 100,
                "categoryId": categories[0].id,
                "month": 3,
                "year": 2025
            }))
            .await
            .json::<BudgetResponse>();

        let response = server
            .put(&format_endpoint(endpoints::BUDGET, budget.budget.id))
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 160,
                "categoryId": categories[1].id,
                "month": 4,
                "year": 2025
            }))
            .await;

        response.assert_status_ok();
        let updated = response.json::<BudgetResponse>();
        assert_eq!(updated.budget.amount, 160.0);
        assert_eq!(updated.budget.category_id, categories[1].id);
        assert_eq!(updated.budget.spent_amount, 80.0);
        assert_eq!(updated.percentage_used, 50.0);
    }

    #[tokio::test]
    async fn update_missing_budget_is_not_found() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let categories = server
            .get(endpoints::CATEGORIES)
            .authorization_bearer(&token)
            .await
            .json::<Vec<Category>>();

        let response = server
            .put(&format_endpoint(endpoints::BUDGET, 999))
            .authorization_bearer(&token)
            .json(&json!({
                "amount": 160,
                "categoryId": categories[0].id,
                "month": 4,
                "year": 2025
            }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<ProblemDetails>().error_code,
            "BUDGET_NOT_FOUND"
        );
    }
}
