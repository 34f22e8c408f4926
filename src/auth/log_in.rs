//! The endpoint for logging in with an email and password.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{AuthResponse, JwtKeys, encode_token, get_user_by_email},
    extract::ApiJson,
    validation::ValidationErrors,
};

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The keys for signing access tokens.
    pub jwt_keys: JwtKeys,
    /// How long an access token is valid for.
    pub token_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            jwt_keys: state.jwt_keys.clone(),
            token_duration: state.token_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for logging in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInForm {
    pub email: String,
    pub password: String,
}

/// Check the user's credentials and issue a new access token.
///
/// An unknown email and a wrong password get the same response so that
/// clients cannot find out which emails are registered.
pub async fn log_in_endpoint(
    State(state): State<LogInState>,
    ApiJson(form): ApiJson<LogInForm>,
) -> Result<Json<AuthResponse>, Error> {
    let mut errors = ValidationErrors::new();
    errors.check(form.email.trim().is_empty(), "email", "Email is required.");
    errors.check(form.password.is_empty(), "password", "Password is required.");
    errors.into_result()?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(&form.email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    let is_password_correct = user
        .password_hash
        .verify(&form.password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_correct {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_token(
        &user,
        OffsetDateTime::now_utc(),
        state.token_duration,
        &state.jwt_keys,
    )?;

    tracing::info!("user {} logged in", user.id);

    Ok(Json(AuthResponse::new(token, &user)))
}
