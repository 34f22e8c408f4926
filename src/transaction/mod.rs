//! Income and expense transactions.
//!
//! Writes to transactions keep the spent amount of the matching budgets in
//! step, see [crate::budget].

mod create;
mod db;
mod delete;
mod domain;
mod edit;
mod list;

pub use create::create_transaction_endpoint;
pub use db::{
    create_transaction, create_transaction_table, delete_transaction, get_transaction,
    get_transactions_in_date_range, get_transactions_page, update_transaction,
};
pub use delete::delete_transaction_endpoint;
pub use domain::{
    MAX_DESCRIPTION_LENGTH, Transaction, TransactionData, TransactionFilter, TransactionForm,
    TransactionQuery, TransactionType,
};
pub use edit::update_transaction_endpoint;
pub use list::{get_transaction_endpoint, list_transactions_endpoint};
