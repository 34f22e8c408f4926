//! The endpoint for registering a new user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{
        AuthResponse, JwtKeys, NewUser, PasswordHash, ValidatedPassword, check_password,
        create_user, email_exists, encode_token,
    },
    category::seed_default_categories,
    extract::ApiJson,
    validation::{ValidationErrors, check_required_text},
};

/// The most characters an email address may have.
pub const MAX_EMAIL_LENGTH: usize = 255;
/// The most characters a first or last name may have.
pub const MAX_NAME_LENGTH: usize = 50;

/// The state needed to register a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The keys for signing access tokens.
    pub jwt_keys: JwtKeys,
    /// How long an access token is valid for.
    pub token_duration: Duration,
    /// The bcrypt cost used when hashing the password.
    pub password_hash_cost: u32,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            jwt_keys: state.jwt_keys.clone(),
            token_duration: state.token_duration,
            password_hash_cost: state.password_hash_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for registering a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterForm {
    fn validate(&self) -> Result<ValidatedPassword, Error> {
        let mut errors = ValidationErrors::new();

        check_email(&mut errors, "email", &self.email);
        check_password(&mut errors, "password", &self.password);
        check_required_text(
            &mut errors,
            "firstName",
            "First name",
            &self.first_name,
            MAX_NAME_LENGTH,
        );
        check_required_text(
            &mut errors,
            "lastName",
            "Last name",
            &self.last_name,
            MAX_NAME_LENGTH,
        );

        errors.into_result()?;

        Ok(ValidatedPassword::new_unchecked(&self.password))
    }
}

/// Check that `email` is present, not too long and a valid email address.
pub fn check_email(errors: &mut ValidationErrors, field: &str, email: &str) {
    let email = email.trim();

    if email.is_empty() {
        errors.add(field, "Email is required.");
    } else if email.chars().count() > MAX_EMAIL_LENGTH {
        errors.add(
            field,
            format!("Email must not exceed {MAX_EMAIL_LENGTH} characters."),
        );
    } else if !EmailAddress::is_valid(email) {
        errors.add(field, "Email must be a valid email address.");
    }
}

/// Register a user, create their default categories and log them in.
///
/// The user and their categories are created in one database transaction.
pub async fn register_endpoint(
    State(state): State<RegistrationState>,
    ApiJson(form): ApiJson<RegisterForm>,
) -> Result<(StatusCode, Json<AuthResponse>), Error> {
    let password = form.validate()?;
    let password_hash = PasswordHash::new(password, state.password_hash_cost)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    if email_exists(&form.email, &connection)? {
        return Err(Error::DuplicateEmail(form.email.trim().to_lowercase()));
    }

    let transaction = connection.unchecked_transaction()?;

    let user = create_user(
        NewUser {
            email: form.email,
            password_hash,
            first_name: form.first_name,
            last_name: form.last_name,
        },
        &transaction,
    )?;
    seed_default_categories(user.id, &transaction)?;

    transaction.commit()?;

    tracing::info!("registered user {}", user.id);

    let token = encode_token(
        &user,
        OffsetDateTime::now_utc(),
        state.token_duration,
        &state.jwt_keys,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new(token, &user)),
    ))
}
