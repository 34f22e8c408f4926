//! Transaction deletion endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    database_id::TransactionId,
    extract::ApiPath,
    transaction::delete_transaction,
};

/// The state needed for deleting a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Delete a transaction and take it out of its budget.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    user: AuthenticatedUser,
    ApiPath(transaction_id): ApiPath<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(transaction_id, user.user_id, &connection)?;
    tracing::info!("user {} deleted transaction {transaction_id}", user.user_id);

    Ok(StatusCode::NO_CONTENT)
}
