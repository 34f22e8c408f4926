//! Category deletion endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    category::delete_category,
    database_id::CategoryId,
    extract::ApiPath,
};

/// The state needed for deleting a category.
#[derive(Debug, Clone)]
pub struct DeleteCategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteCategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Delete a category that is neither a default category nor in use.
pub async fn delete_category_endpoint(
    State(state): State<DeleteCategoryState>,
    user: AuthenticatedUser,
    ApiPath(category_id): ApiPath<CategoryId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_category(category_id, user.user_id, &connection)?;
    tracing::info!("user {} deleted category {category_id}", user.user_id);

    Ok(StatusCode::NO_CONTENT)
}
