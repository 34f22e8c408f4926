//! Database queries for transactions.
//!
//! Creating, updating and deleting a transaction also updates the spent amount
//! of the matching budget, both in one SQL transaction.

use rusqlite::{Connection, Row, ToSql, params_from_iter};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    auth::UserID,
    budget::{BudgetImpact, apply_budget_impact, revert_budget_impact},
    category::ensure_category_belongs_to_user,
    database_id::TransactionId,
    pagination::Page,
    transaction::{Transaction, TransactionData, TransactionFilter},
};

const TRANSACTION_COLUMNS: &str = "t.id, t.amount, t.description, t.date, t.type, t.category_id, \
    c.name, c.color, t.user_id, t.created_at, t.updated_at";

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            amount REAL NOT NULL CHECK (amount > 0),
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('Income', 'Expense')),
            user_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_transaction_category ON \"transaction\"(category_id);",
    )?;

    Ok(())
}

/// Create a transaction for `user_id` and add it to the matching budget.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category does not belong to the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    data: &TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    ensure_category_belongs_to_user(data.category_id, user_id, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;
    let now = OffsetDateTime::now_utc();

    let id: TransactionId = sql_transaction
        .prepare(
            "INSERT INTO \"transaction\" (amount, description, date, type, user_id, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             RETURNING id",
        )?
        .query_row(
            (
                data.amount,
                &data.description,
                data.date,
                data.transaction_type,
                user_id.as_i64(),
                data.category_id,
                now,
            ),
            |row| row.get(0),
        )?;

    if let Some(impact) = impact_of_data(data) {
        apply_budget_impact(user_id, &impact, &sql_transaction)?;
    }

    let transaction = get_transaction(id, user_id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Retrieve a transaction owned by `user_id`, including its category name and colour.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if the transaction does not exist or belongs to another user.
pub fn get_transaction(
    transaction_id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
             INNER JOIN category c ON c.id = t.category_id
             WHERE t.id = ?1 AND t.user_id = ?2"
        ))?
        .query_row((transaction_id, user_id.as_i64()), map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound(transaction_id),
            error => error.into(),
        })
}

/// Overwrite a transaction and move its contribution between budgets.
///
/// The old expense, if it was one, is removed from its budget before the new
/// expense, if it is one, is added to its budget.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if the transaction does not exist or belongs to another user,
/// - [Error::InvalidCategory] if the new category does not belong to the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    transaction_id: TransactionId,
    user_id: UserID,
    data: &TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let old_transaction = get_transaction(transaction_id, user_id, &sql_transaction)?;
    ensure_category_belongs_to_user(data.category_id, user_id, &sql_transaction)?;

    sql_transaction.execute(
        "UPDATE \"transaction\"
         SET amount = ?1, description = ?2, date = ?3, type = ?4, category_id = ?5, updated_at = ?6
         WHERE id = ?7 AND user_id = ?8",
        (
            data.amount,
            &data.description,
            data.date,
            data.transaction_type,
            data.category_id,
            OffsetDateTime::now_utc(),
            transaction_id,
            user_id.as_i64(),
        ),
    )?;

    if let Some(old_impact) = impact_of_transaction(&old_transaction) {
        revert_budget_impact(user_id, &old_impact, &sql_transaction)?;
    }

    if let Some(new_impact) = impact_of_data(data) {
        apply_budget_impact(user_id, &new_impact, &sql_transaction)?;
    }

    let transaction = get_transaction(transaction_id, user_id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete a transaction and remove it from the matching budget.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if the transaction does not exist or belongs to another user.
pub fn delete_transaction(
    transaction_id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = get_transaction(transaction_id, user_id, &sql_transaction)?;

    let rows_affected = sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (transaction_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound(transaction_id));
    }

    if let Some(impact) = impact_of_transaction(&transaction) {
        revert_budget_impact(user_id, &impact, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(())
}

/// Get one page of the user's transactions matching `filter`, newest first,
/// and the number of matching transactions across all pages.
pub fn get_transactions_page(
    user_id: UserID,
    filter: &TransactionFilter,
    page: Page,
    connection: &Connection,
) -> Result<(Vec<Transaction>, u64), Error> {
    let (where_clause, mut params) = build_where_clause(user_id, filter);

    let total_count: i64 = connection.query_row(
        &format!("SELECT COUNT(t.id) FROM \"transaction\" t {where_clause}"),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let limit_index = params.len() + 1;
    params.push(Box::new(i64::try_from(page.page_size).unwrap_or(i64::MAX)));
    params.push(Box::new(i64::try_from(page.offset()).unwrap_or(i64::MAX)));

    // Sort by date, and then ID to keep transaction order stable after updates
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
         INNER JOIN category c ON c.id = t.category_id
         {where_clause}
         ORDER BY t.date DESC, t.id DESC
         LIMIT ?{limit_index} OFFSET ?{}",
        limit_index + 1
    );

    let transactions = connection
        .prepare(&query)?
        .query_map(params_from_iter(params.iter()), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((transactions, total_count.max(0) as u64))
}

/// Get all of the user's transactions dated between `start` and `end` inclusive.
pub fn get_transactions_in_date_range(
    user_id: UserID,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
             INNER JOIN category c ON c.id = t.category_id
             WHERE t.user_id = ?1 AND t.date BETWEEN ?2 AND ?3
             ORDER BY t.date ASC, t.id ASC"
        ))?
        .query_map((user_id.as_i64(), start, end), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

fn build_where_clause(
    user_id: UserID,
    filter: &TransactionFilter,
) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions = vec!["t.user_id = ?1".to_owned()];
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.as_i64())];

    let mut push = |condition: &str, param: Box<dyn ToSql>| {
        params.push(param);
        conditions.push(condition.replace('?', &format!("?{}", params.len())));
    };

    if let Some(start_date) = filter.start_date {
        push("t.date >= ?", Box::new(start_date));
    }

    if let Some(end_date) = filter.end_date {
        push("t.date <= ?", Box::new(end_date));
    }

    if let Some(category_id) = filter.category_id {
        push("t.category_id = ?", Box::new(category_id));
    }

    if let Some(transaction_type) = filter.transaction_type {
        push("t.type = ?", Box::new(transaction_type));
    }

    if let Some(search) = &filter.search {
        push(
            "instr(lower(t.description), lower(?)) > 0",
            Box::new(search.clone()),
        );
    }

    (format!("WHERE {}", conditions.join(" AND ")), params)
}

fn impact_of_data(data: &TransactionData) -> Option<BudgetImpact> {
    BudgetImpact::of(
        data.transaction_type,
        data.category_id,
        data.date,
        data.amount,
    )
}

fn impact_of_transaction(transaction: &Transaction) -> Option<BudgetImpact> {
    BudgetImpact::of(
        transaction.transaction_type,
        transaction.category_id,
        transaction.date,
        transaction.amount,
    )
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        transaction_type: row.get(4)?,
        category_id: row.get(5)?,
        category_name: row.get(6)?,
        category_color: row.get(7)?,
        user_id: UserID::new(row.get(8)?),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}


#[cfg(test)]
mod budget_reconciliation_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        auth::User,
        budget::{BudgetData, create_budget, get_budget, recompute_spent_amount},
        category::{Category, CategoryData, create_category},
        transaction::{
            TransactionData, TransactionType, create_transaction, delete_transaction,
            update_transaction,
        },
        test_utils::{get_test_connection, insert_test_user},
    };

    fn category(name: &str, user: &User, connection: &Connection) -> Category {
        create_category(
            user.id,
            &CategoryData {
                name: name.to_owned(),
                description: None,
                color: "#10B981".to_owned(),
            },
            false,
            connection,
        )
        .unwrap()
    }

    fn data(
        amount: f64,
        date: time::Date,
        transaction_type: TransactionType,
        category: &Category,
    ) -> TransactionData {
        TransactionData {
            amount,
            description: "Test".to_owned(),
            date,
            transaction_type,
            category_id: category.id,
        }
    }

    fn march_budget(category: &Category, user: &User, connection: &Connection) -> i64 {
        create_budget(
            user.id,
            &BudgetData {
                amount: 500.0,
                category_id: category.id,
                month: 3,
                year: 2025,
            },
            connection,
        )
        .unwrap()
        .id
    }

    fn spent(budget_id: i64, user: &User, connection: &Connection) -> f64 {
        get_budget(budget_id, user.id, connection)
            .unwrap()
            .spent_amount
    }

    #[test]
    fn creating_expense_adds_to_budget() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        let budget_id = march_budget(&food, &user, &connection);

        create_transaction(
            user.id,
            &data(
                40.25,
                date!(2025 - 03 - 05),
                TransactionType::Expense,
                &food,
            ),
            &connection,
        )
        .unwrap();

        assert_eq!(spent(budget_id, &user, &connection), 40.25);
    }

    #[test]
    fn income_and_other_months_do_not_count() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        let budget_id = march_budget(&food, &user, &connection);

        create_transaction(
            user.id,
            &data(40.0, date!(2025 - 03 - 05), TransactionType::Income, &food),
            &connection,
        )
        .unwrap();
        create_transaction(
            user.id,
            &data(40.0, date!(2025 - 04 - 01), TransactionType::Expense, &food),
            &connection,
        )
        .unwrap();

        assert_eq!(spent(budget_id, &user, &connection), 0.0);
    }

    #[test]
    fn budget_created_after_expenses_starts_with_their_sum() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        for day in [1, 15, 31] {
            let date = time::Date::from_calendar_date(2025, time::Month::March, day).unwrap();
            create_transaction(
                user.id,
                &data(10.1, date, TransactionType::Expense, &food),
                &connection,
            )
            .unwrap();
        }

        let budget_id = march_budget(&food, &user, &connection);

        assert_eq!(spent(budget_id, &user, &connection), 30.3);
    }

    #[test]
    fn deleting_expense_subtracts_from_budget() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        let budget_id = march_budget(&food, &user, &connection);
        let transaction = create_transaction(
            user.id,
            &data(40.0, date!(2025 - 03 - 05), TransactionType::Expense, &food),
            &connection,
        )
        .unwrap();

        delete_transaction(transaction.id, user.id, &connection).unwrap();

        assert_eq!(spent(budget_id, &user, &connection), 0.0);
    }

    #[test]
    fn updating_expense_moves_it_between_budgets() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        let fun = category("Fun", &user, &connection);
        let food_budget = march_budget(&food, &user, &connection);
        let fun_budget = march_budget(&fun, &user, &connection);
        let transaction = create_transaction(
            user.id,
            &data(40.0, date!(2025 - 03 - 05), TransactionType::Expense, &food),
            &connection,
        )
        .unwrap();

        update_transaction(
            transaction.id,
            user.id,
            &data(25.0, date!(2025 - 03 - 06), TransactionType::Expense, &fun),
            &connection,
        )
        .unwrap();

        assert_eq!(spent(food_budget, &user, &connection), 0.0);
        assert_eq!(spent(fun_budget, &user, &connection), 25.0);
    }

    #[test]
    fn changing_expense_to_income_removes_it_from_budget() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        let budget_id = march_budget(&food, &user, &connection);
        let transaction = create_transaction(
            user.id,
            &data(40.0, date!(2025 - 03 - 05), TransactionType::Expense, &food),
            &connection,
        )
        .unwrap();

        update_transaction(
            transaction.id,
            user.id,
            &data(40.0, date!(2025 - 03 - 05), TransactionType::Income, &food),
            &connection,
        )
        .unwrap();

        assert_eq!(spent(budget_id, &user, &connection), 0.0);
    }

    #[test]
    fn incremental_updates_match_recomputation() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let food = category("Food", &user, &connection);
        let fun = category("Fun", &user, &connection);
        let food_budget = march_budget(&food, &user, &connection);
        let fun_budget = march_budget(&fun, &user, &connection);

        let mut ids = Vec::new();
        for (i, amount) in [12.34, 0.1, 0.2, 99.99, 45.0, 3.33].into_iter().enumerate() {
            let target = if i % 2 == 0 { &food } else { &fun };
            let transaction_type = if i % 3 == 0 {
                TransactionType::Income
            } else {
                TransactionType::Expense
            };
            let date = time::Date::from_calendar_date(2025, time::Month::March, 1 + i as u8)
                .unwrap();
            ids.push(
                create_transaction(
                    user.id,
                    &data(amount, date, transaction_type, target),
                    &connection,
                )
                .unwrap()
                .id,
            );
        }

        update_transaction(
            ids[0],
            user.id,
            &data(7.77, date!(2025 - 03 - 20), TransactionType::Expense, &fun),
            &connection,
        )
        .unwrap();
        update_transaction(
            ids[1],
            user.id,
            &data(1.11, date!(2025 - 02 - 20), TransactionType::Expense, &food),
            &connection,
        )
        .unwrap();
        delete_transaction(ids[4], user.id, &connection).unwrap();

        for budget_id in [food_budget, fun_budget] {
            let incremental = spent(budget_id, &user, &connection);
            let recomputed = recompute_spent_amount(budget_id, user.id, &connection).unwrap();

            assert_eq!(incremental, recomputed, "budget {budget_id} drifted");
        }
    }
}
