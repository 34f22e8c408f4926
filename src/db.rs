//! Creates the database schema.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, auth::create_user_table, budget::create_budget_table,
    category::create_category_table, transaction::create_transaction_table,
};

/// Create the tables and indexes for the domain models if they do not exist.
///
/// Foreign key enforcement is switched on for `connection`, and the tables are
/// created in a single exclusive transaction.
///
/// # Errors
/// Returns an error if a table could not be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction, so it must run first.
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
