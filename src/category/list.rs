//! Endpoints for reading categories.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    category::{Category, get_categories, get_category},
    database_id::CategoryId,
    extract::ApiPath,
};

/// The state needed for reading categories.
#[derive(Debug, Clone)]
pub struct ListCategoriesState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListCategoriesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the categories of the user ordered by name.
pub async fn list_categories_endpoint(
    State(state): State<ListCategoriesState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_categories(user.user_id, &connection).map(Json)
}

/// Get a single category of the user.
pub async fn get_category_endpoint(
    State(state): State<ListCategoriesState>,
    user: AuthenticatedUser,
    ApiPath(category_id): ApiPath<CategoryId>,
) -> Result<Json<Category>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_category(category_id, user.user_id, &connection).map(Json)
}
