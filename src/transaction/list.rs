//! Endpoints for reading transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    database_id::TransactionId,
    extract::{ApiPath, ApiQuery},
    pagination::{PagedResponse, PaginationConfig},
    transaction::{Transaction, TransactionQuery, get_transaction, get_transactions_page},
};

/// The state needed for reading transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The config that controls how to page transactions.
    pub pagination_config: PaginationConfig,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            pagination_config: state.pagination_config,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List one page of the user's transactions, newest first.
///
/// The list can be narrowed by date range, category, type and a case
/// insensitive search of the description.
pub async fn list_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<Json<PagedResponse<Transaction>>, Error> {
    let filter = query.filter()?;
    let page = state
        .pagination_config
        .resolve(query.page, query.page_size);

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let (transactions, total_count) =
        get_transactions_page(user.user_id, &filter, page, &connection)?;

    Ok(Json(PagedResponse::new(transactions, page, total_count)))
}

/// Get a single transaction of the user.
pub async fn get_transaction_endpoint(
    State(state): State<ListTransactionsState>,
    user: AuthenticatedUser,
    ApiPath(transaction_id): ApiPath<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_transaction(transaction_id, user.user_id, &connection).map(Json)
}
