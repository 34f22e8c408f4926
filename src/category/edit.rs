//! Category update endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    category::{Category, CategoryForm, update_category},
    database_id::CategoryId,
    extract::{ApiJson, ApiPath},
};

/// The state needed for updating a category.
#[derive(Debug, Clone)]
pub struct UpdateCategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateCategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Update the name, description and colour of a category.
///
/// Default categories may be renamed and recoloured.
pub async fn update_category_endpoint(
    State(state): State<UpdateCategoryState>,
    user: AuthenticatedUser,
    ApiPath(category_id): ApiPath<CategoryId>,
    ApiJson(form): ApiJson<CategoryForm>,
) -> Result<Json<Category>, Error> {
    let data = form.validate()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    update_category(category_id, user.user_id, &data, &connection).map(Json)
}
