//! Category creation endpoint.

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
    category::{Category, CategoryForm, create_category},
    extract::ApiJson,
};

/// The state needed for creating a category.
#[derive(Debug, Clone)]
pub struct CreateCategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateCategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Create a category for the user.
pub async fn create_category_endpoint(
    State(state): State<CreateCategoryState>,
    user: AuthenticatedUser,
    ApiJson(form): ApiJson<CategoryForm>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let data = form.validate()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(user.user_id, &data, false, &connection)?;
    tracing::info!("user {} created category {}", user.user_id, category.id);

    Ok((StatusCode::CREATED, Json(category)))
}
