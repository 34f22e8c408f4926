//! Database operations for budgets.

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    budget::{Budget, BudgetData, recompute_spent_amount, sum_expenses},
    category::ensure_category_belongs_to_user,
    database_id::BudgetId,
};

const BUDGET_COLUMNS: &str = "b.id, b.amount, b.spent_amount, b.month, b.year, b.category_id, \
    c.name, c.color, b.user_id, b.created_at, b.updated_at";

/// Initialize the budget table and indexes.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            amount REAL NOT NULL CHECK (amount > 0),
            spent_amount REAL NOT NULL DEFAULT 0,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, category_id, month, year),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_budget_user_period ON budget(user_id, year, month);",
    )?;

    Ok(())
}

/// Create a budget for `user_id`.
///
/// The spent amount starts as the sum of the expenses already recorded in the
/// category and month.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category does not belong to the user,
/// - [Error::DuplicateBudget] if the user already has a budget for the category and month,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(
    user_id: UserID,
    data: &BudgetData,
    connection: &Connection,
) -> Result<Budget, Error> {
    ensure_category_belongs_to_user(data.category_id, user_id, connection)?;

    if budget_exists(user_id, data, None, connection)? {
        return Err(duplicate_budget(data));
    }

    let sql_transaction = connection.unchecked_transaction()?;
    let spent_amount = sum_expenses(
        user_id,
        data.category_id,
        data.month,
        data.year,
        &sql_transaction,
    )?;
    let now = OffsetDateTime::now_utc();

    let id: BudgetId = sql_transaction
        .prepare(
            "INSERT INTO budget (amount, spent_amount, month, year, user_id, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             RETURNING id",
        )?
        .query_row(
            (
                data.amount,
                spent_amount,
                data.month,
                data.year,
                user_id.as_i64(),
                data.category_id,
                now,
            ),
            |row| row.get(0),
        )
        .map_err(|error| map_unique_budget_error(error, data))?;

    let budget = get_budget(id, user_id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(budget)
}

/// Retrieve a budget owned by `user_id`, including its category name and colour.
///
/// # Errors
/// Returns [Error::BudgetNotFound] if the budget does not exist or belongs to another user.
pub fn get_budget(
    budget_id: BudgetId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget b
             INNER JOIN category c ON c.id = b.category_id
             WHERE b.id = ?1 AND b.user_id = ?2"
        ))?
        .query_row((budget_id, user_id.as_i64()), map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::BudgetNotFound(budget_id),
            error => error.into(),
        })
}

/// Retrieve the budgets of `user_id`, optionally only those for a month and/or year.
///
/// Budgets are ordered by period, newest first, and then by category name.
pub fn get_budgets(
    user_id: UserID,
    month: Option<u8>,
    year: Option<i32>,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget b
             INNER JOIN category c ON c.id = b.category_id
             WHERE b.user_id = ?1
                AND (?2 IS NULL OR b.month = ?2)
                AND (?3 IS NULL OR b.year = ?3)
             ORDER BY b.year DESC, b.month DESC, c.name_key ASC"
        ))?
        .query_map((user_id.as_i64(), month, year), map_row)?
        .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the amount, category and period of a budget.
///
/// When the category or period changes the spent amount is recomputed from
/// the expenses in the new category and month.
///
/// # Errors
/// This function will return a:
/// - [Error::BudgetNotFound] if the budget does not exist or belongs to another user,
/// - [Error::InvalidCategory] if the category does not belong to the user,
/// - [Error::DuplicateBudget] if another budget of the user has the same category and month,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_budget(
    budget_id: BudgetId,
    user_id: UserID,
    data: &BudgetData,
    connection: &Connection,
) -> Result<Budget, Error> {
    let old_budget = get_budget(budget_id, user_id, connection)?;
    ensure_category_belongs_to_user(data.category_id, user_id, connection)?;

    if budget_exists(user_id, data, Some(budget_id), connection)? {
        return Err(duplicate_budget(data));
    }

    let sql_transaction = connection.unchecked_transaction()?;

    sql_transaction
        .execute(
            "UPDATE budget SET amount = ?1, category_id = ?2, month = ?3, year = ?4, updated_at = ?5
             WHERE id = ?6 AND user_id = ?7",
            (
                data.amount,
                data.category_id,
                data.month,
                data.year,
                OffsetDateTime::now_utc(),
                budget_id,
                user_id.as_i64(),
            ),
        )
        .map_err(|error| map_unique_budget_error(error, data))?;

    let period_changed = old_budget.category_id != data.category_id
        || old_budget.month != data.month
        || old_budget.year != data.year;

    if period_changed {
        recompute_spent_amount(budget_id, user_id, &sql_transaction)?;
    }

    let budget = get_budget(budget_id, user_id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(budget)
}

/// Delete a budget owned by `user_id`.
///
/// # Errors
/// Returns [Error::BudgetNotFound] if the budget does not exist or belongs to another user.
pub fn delete_budget(
    budget_id: BudgetId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget WHERE id = ?1 AND user_id = ?2",
        (budget_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::BudgetNotFound(budget_id));
    }

    Ok(())
}

fn budget_exists(
    user_id: UserID,
    data: &BudgetData,
    excluding: Option<BudgetId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let existing_id: Option<BudgetId> = connection
        .query_row(
            "SELECT id FROM budget WHERE user_id = ?1 AND category_id = ?2 AND month = ?3 AND year = ?4",
            (user_id.as_i64(), data.category_id, data.month, data.year),
            |row| row.get(0),
        )
        .optional()?;

    Ok(match (existing_id, excluding) {
        (Some(existing_id), Some(excluding)) => existing_id != excluding,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

fn duplicate_budget(data: &BudgetData) -> Error {
    Error::DuplicateBudget {
        category_id: data.category_id,
        month: data.month,
        year: data.year,
    }
}

fn map_unique_budget_error(error: rusqlite::Error, data: &BudgetData) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => duplicate_budget(data),
        error => error.into(),
    }
}

fn map_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        amount: row.get(1)?,
        spent_amount: row.get(2)?,
        month: row.get(3)?,
        year: row.get(4)?,
        category_id: row.get(5)?,
        category_name: row.get(6)?,
        category_color: row.get(7)?,
        user_id: UserID::new(row.get(8)?),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod budget_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::User,
        budget::{BudgetData, create_budget, delete_budget, get_budget, get_budgets, update_budget},
        category::{Category, CategoryData, create_category},
        test_utils::{get_test_connection, insert_test_user},
    };

    fn category(name: &str, user: &User, connection: &Connection) -> Category {
        create_category(
            user.id,
            &CategoryData {
                name: name.to_owned(),
                description: None,
                color: "#F59E0B".to_owned(),
            },
            false,
            connection,
        )
        .unwrap()
    }

    fn data(category: &Category, month: u8, year: i32) -> BudgetData {
        BudgetData {
            amount: 300.0,
            category_id: category.id,
            month,
            year,
        }
    }

    fn setup() -> (Connection, User, Category) {
        let connection = get_test_connection();
        let user = insert_test_user(&connection, "ada@example.com");
        let category = category("Food", &user, &connection);

        (connection, user, category)
    }

    #[test]
    fn create_budget_succeeds() {
        let (connection, user, category) = setup();

        let budget = create_budget(user.id, &data(&category, 3, 2025), &connection)
            .expect("Could not create budget");

        assert!(budget.id > 0);
        assert_eq!(budget.amount, 300.0);
        assert_eq!(budget.spent_amount, 0.0);
        assert_eq!(budget.category_name, "Food");
        assert_eq!(get_budget(budget.id, user.id, &connection), Ok(budget));
    }

    #[test]
    fn create_budget_rejects_duplicate_period() {
        let (connection, user, category) = setup();
        create_budget(user.id, &data(&category, 3, 2025), &connection).unwrap();

        let result = create_budget(user.id, &data(&category, 3, 2025), &connection);

        assert_eq!(
            result,
            Err(Error::DuplicateBudget {
                category_id: category.id,
                month: 3,
                year: 2025
            })
        );
    }

    #[test]
    fn create_budget_rejects_category_of_other_user() {
        let (connection, _, category) = setup();
        let other_user = insert_test_user(&connection, "bob@example.com");

        let result = create_budget(other_user.id, &data(&category, 3, 2025), &connection);

        assert_eq!(result, Err(Error::InvalidCategory(category.id)));
    }

    #[test]
    fn get_budgets_filters_by_period() {
        let (connection, user, food) = setup();
        let fun = category("Fun", &user, &connection);
        create_budget(user.id, &data(&food, 3, 2025), &connection).unwrap();
        create_budget(user.id, &data(&fun, 3, 2025), &connection).unwrap();
        create_budget(user.id, &data(&food, 4, 2025), &connection).unwrap();
        create_budget(user.id, &data(&food, 3, 2024), &connection).unwrap();

        let march = get_budgets(user.id, Some(3), Some(2025), &connection).unwrap();
        let all_of_2025 = get_budgets(user.id, None, Some(2025), &connection).unwrap();
        let every_march = get_budgets(user.id, Some(3), None, &connection).unwrap();
        let all = get_budgets(user.id, None, None, &connection).unwrap();

        assert_eq!(march.len(), 2);
        assert_eq!(march[0].category_name, "Food");
        assert_eq!(march[1].category_name, "Fun");
        assert_eq!(all_of_2025.len(), 3);
        assert_eq!(all_of_2025[0].month, 4);
        assert_eq!(every_march.len(), 3);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn get_budgets_only_returns_own_budgets() {
        let (connection, user, category) = setup();
        let other_user = insert_test_user(&connection, "bob@example.com");
        create_budget(user.id, &data(&category, 3, 2025), &connection).unwrap();

        let budgets = get_budgets(other_user.id, None, None, &connection).unwrap();

        assert!(budgets.is_empty());
    }

    #[test]
    fn update_budget_succeeds() {
        let (connection, user, category) = setup();
        let budget = create_budget(user.id, &data(&category, 3, 2025), &connection).unwrap();
        let mut new_data = data(&category, 3, 2025);
        new_data.amount = 450.5;

        let updated = update_budget(budget.id, user.id, &new_data, &connection).unwrap();

        assert_eq!(updated.amount, 450.5);
        assert_eq!(updated.created_at, budget.created_at);
    }

    #[test]
    fn update_budget_rejects_clash_with_other_budget() {
        let (connection, user, category) = setup();
        create_budget(user.id, &data(&category, 3, 2025), &connection).unwrap();
        let april = create_budget(user.id, &data(&category, 4, 2025), &connection).unwrap();

        let result = update_budget(april.id, user.id, &data(&category, 3, 2025), &connection);

        assert!(matches!(result, Err(Error::DuplicateBudget { .. })));
    }

    #[test]
    fn update_budget_of_other_user_is_not_found() {
        let (connection, user, category) = setup();
        let other_user = insert_test_user(&connection, "bob@example.com");
        let budget = create_budget(user.id, &data(&category, 3, 2025), &connection).unwrap();

        let result = update_budget(budget.id, other_user.id, &data(&category, 3, 2025), &connection);

        assert_eq!(result, Err(Error::BudgetNotFound(budget.id)));
    }

    #[test]
    fn delete_budget_succeeds() {
        let (connection, user, category) = setup();
        let budget = create_budget(user.id, &data(&category, 3, 2025), &connection).unwrap();

        delete_budget(budget.id, user.id, &connection).unwrap();

        assert_eq!(
            get_budget(budget.id, user.id, &connection),
            Err(Error::BudgetNotFound(budget.id))
        );
        assert_eq!(
            delete_budget(budget.id, user.id, &connection),
            Err(Error::BudgetNotFound(budget.id))
        );
    }
}
