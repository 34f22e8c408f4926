//! The endpoint that returns the user a token belongs to.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::{AuthenticatedUser, UserResponse, get_user_by_id},
};

/// The state needed to look up the current user.
#[derive(Debug, Clone)]
pub struct CurrentUserState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CurrentUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Get the user that made the request.
pub async fn get_current_user_endpoint(
    State(state): State<CurrentUserState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    match get_user_by_id(user.user_id, &connection) {
        Ok(user) => Ok(Json(UserResponse::from(&user))),
        // The token outlived the user it was issued to.
        Err(Error::NotFound) => Err(Error::InvalidToken),
        Err(error) => Err(error),
    }
}
