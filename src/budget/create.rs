//! Budget creation endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    budget::{BudgetForm, BudgetResponse, create_budget},
    extract::ApiJson,
};

/// The state needed for creating a budget.
#[derive(Debug, Clone)]
pub struct CreateBudgetState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateBudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Create a budget for one of the user's categories in a month.
pub async fn create_budget_endpoint(
    State(state): State<CreateBudgetState>,
    user: AuthenticatedUser,
    ApiJson(form): ApiJson<BudgetForm>,
) -> Result<(StatusCode, Json<BudgetResponse>), Error> {
    let data = form.validate()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let budget = create_budget(user.user_id, &data, &connection)?;
    tracing::info!(
        "user {} created budget {} for {}/{}",
        user.user_id,
        budget.id,
        budget.month,
        budget.year
    );

    Ok((StatusCode::CREATED, Json(budget.into())))
}
