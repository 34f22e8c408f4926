//! Transaction update endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    database_id::TransactionId,
    extract::{ApiJson, ApiPath},
    transaction::{Transaction, TransactionForm, update_transaction},
};

/// The state needed for updating a transaction.
#[derive(Debug, Clone)]
pub struct UpdateTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Replace every field of a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<UpdateTransactionState>,
    user: AuthenticatedUser,
    ApiPath(transaction_id): ApiPath<TransactionId>,
    ApiJson(form): ApiJson<TransactionForm>,
) -> Result<Json<Transaction>, Error> {
    let data = form.validate(OffsetDateTime::now_utc().date())?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = update_transaction(transaction_id, user.user_id, &data, &connection)?;
    tracing::info!("user {} updated transaction {transaction_id}", user.user_id);

    Ok(Json(transaction))
}
