//! Endpoints for reading budgets.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    budget::{BudgetQuery, BudgetResponse, get_budget, get_budgets},
    database_id::BudgetId,
    extract::{ApiPath, ApiQuery},
};

/// The state needed for reading budgets.
#[derive(Debug, Clone)]
pub struct ListBudgetsState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListBudgetsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the budgets of the user, optionally for a single month and/or year.
pub async fn list_budgets_endpoint(
    State(state): State<ListBudgetsState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<BudgetQuery>,
) -> Result<Json<Vec<BudgetResponse>>, Error> {
    let (month, year) = query.validate()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let budgets = get_budgets(user.user_id, month, year, &connection)?;

    Ok(Json(budgets.into_iter().map(BudgetResponse::from).collect()))
}

/// Get a single budget of the user.
pub async fn get_budget_endpoint(
    State(state): State<ListBudgetsState>,
    user: AuthenticatedUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<BudgetResponse>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_budget(budget_id, user.user_id, &connection).map(|budget| Json(budget.into()))
}

#[cfg(test)]
mod list_budgets_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        budget::BudgetResponse,
        category::Category,
        endpoints::{self, format_endpoint},
        problem_details::ProblemDetails,
        test_utils::{get_test_server, register_test_user},
    };

    async fn create_budgets(server: &axum_test::TestServer, token: &str) -> Vec<BudgetResponse> {
        let categories = server
            .get(endpoints::CATEGORIES)
            .authorization_bearer(token)
            .await
            .json::<Vec<Category>>();
        let mut budgets = Vec::new();

        for (category, month, year) in [
            (&categories[0], 3, 2025),
            (&categories[1], 3, 2025),
            (&categories[0], 4, 2025),
            (&categories[0], 3, 2024),
        ] {
            budgets.push(
                server
                    .post(endpoints::BUDGETS)
                    .authorization_bearer(token)
                    .json(&json!({
                        "amount": 100,
                        "categoryId": category.id,
                        "month": month,
                        "year": year
                    }))
                    .await
                    .json::<BudgetResponse>(),
            );
        }

        budgets
    }

    #[tokio::test]
    async fn list_budgets_for_month() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        create_budgets(&server, &token).await;

        let response = server
            .get(endpoints::BUDGETS)
            .add_query_param("month", 3)
            .add_query_param("year", 2025)
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        let budgets = response.json::<Vec<BudgetResponse>>();
        assert_eq!(budgets.len(), 2);
        assert!(
            budgets
                .iter()
                .all(|budget| budget.budget.month == 3 && budget.budget.year == 2025)
        );
    }

    #[tokio::test]
    async fn list_all_budgets() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        create_budgets(&server, &token).await;

        let budgets = server
            .get(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .await
            .json::<Vec<BudgetResponse>>();

        assert_eq!(budgets.len(), 4);
        assert_eq!((budgets[0].budget.month, budgets[0].budget.year), (4, 2025));
        assert_eq!(budgets[3].budget.year, 2024);
    }

    #[tokio::test]
    async fn invalid_month_filter_is_rejected() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;

        let response = server
            .get(endpoints::BUDGETS)
            .add_query_param("month", 13)
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<ProblemDetails>().error_code,
            "VALIDATION_FAILED"
        );
    }

    #[tokio::test]
    async fn get_budget_succeeds() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let budgets = create_budgets(&server, &token).await;

        let response = server
            .get(&format_endpoint(endpoints::BUDGET, budgets[0].budget.id))
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        response.assert_json(&budgets[0]);
    }

    #[tokio::test]
    async fn budgets_of_other_users_are_not_found() {
        let server = get_test_server();
        let token = register_test_user(&server, "ada@example.com").await;
        let other_token = register_test_user(&server, "bob@example.com").await;
        let budgets = create_budgets(&server, &token).await;

        let response = server
            .get(&format_endpoint(endpoints::BUDGET, budgets[0].budget.id))
            .authorization_bearer(&other_token)
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<ProblemDetails>().error_code,
            "BUDGET_NOT_FOUND"
        );
    }
}
